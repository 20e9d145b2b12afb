use core::fmt;
use core::marker::PhantomData;

use crate::access::FlatListRead;
use crate::cursor::Iter;
use crate::error::FlatListError;
use crate::traits::FlatForwardListTraits;
use crate::validate::validate;

/// Non-owning, read-only view over a list stored in someone else's buffer.
///
/// The buffer must outlive the view; the borrow checker enforces that.
/// A view never writes to the buffer.
pub struct FlatForwardListRef<'a, T> {
    buffer: &'a [u8],
    last: Option<usize>,
    _traits: PhantomData<fn() -> T>,
}

impl<'a, T: FlatForwardListTraits> FlatForwardListRef<'a, T> {
    /// Creates a view over an untrusted buffer.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::InvalidBuffer` if the buffer does not hold a
    /// well-formed list. The error carries the last trustworthy record, see
    /// `from_valid_prefix` to keep it.
    pub fn new(buffer: &'a [u8]) -> Result<Self, FlatListError> {
        let validation = validate::<T>(buffer);
        if !validation.is_valid {
            return Err(FlatListError::InvalidBuffer {
                last_valid: validation.last_valid,
            });
        }
        Ok(Self::from_raw_parts(buffer, validation.last_valid))
    }

    /// Creates a view over the well-formed prefix of an untrusted buffer,
    /// dropping whatever follows the last trustworthy record.
    #[must_use]
    pub fn from_valid_prefix(buffer: &'a [u8]) -> Self {
        let validation = validate::<T>(buffer);
        Self::from_raw_parts(buffer, validation.last_valid)
    }

    /// Creates a view without validation.
    ///
    /// `last` must be the offset of the last record of a well-formed list in
    /// `buffer`. Only the bounds of the last record are checked.
    ///
    /// # Panics
    ///
    /// Panics if the last record does not fit into `buffer`.
    #[must_use]
    pub fn from_raw_parts(buffer: &'a [u8], last: Option<usize>) -> Self {
        if let Some(last) = last {
            assert!(
                last + T::minimum_size() <= buffer.len()
                    && last + T::size(&buffer[last..]) <= buffer.len(),
                "last element at {last} does not fit into a buffer of {} bytes",
                buffer.len()
            );
        }
        Self {
            buffer,
            last,
            _traits: PhantomData,
        }
    }

    /// Creates an empty view.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_raw_parts(&[], None)
    }

    /// Same as `FlatListRead::iter`, but tied to the buffer lifetime rather
    /// than to the view.
    #[must_use]
    pub fn iter(&self) -> Iter<'a, T> {
        Iter::new(self.buffer, self.last)
    }
}

impl<T: FlatForwardListTraits> FlatListRead for FlatForwardListRef<'_, T> {
    type Traits = T;

    fn buffer(&self) -> &[u8] {
        self.buffer
    }

    fn last_offset(&self) -> Option<usize> {
        self.last
    }
}

impl<T> Clone for FlatForwardListRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FlatForwardListRef<'_, T> {}

impl<T> fmt::Debug for FlatForwardListRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatForwardListRef")
            .field("buffer_len", &self.buffer.len())
            .field("last", &self.last)
            .finish()
    }
}

impl<'a, T: FlatForwardListTraits> IntoIterator for &FlatForwardListRef<'a, T> {
    type Item = &'a [u8];
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        Iter::new(self.buffer, self.last)
    }
}

impl<'a, T: FlatForwardListTraits> IntoIterator for FlatForwardListRef<'a, T> {
    type Item = &'a [u8];
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        Iter::new(self.buffer, self.last)
    }
}
