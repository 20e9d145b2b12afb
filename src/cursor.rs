use core::iter::FusedIterator;
use core::marker::PhantomData;

use crate::capability::TraitsExt;
use crate::traits::FlatForwardListTraits;

/// Position of a record inside a list, or the end sentinel.
///
/// A cursor is only an offset. It does not borrow the list, so it can be
/// handed back to mutating operations, and it is only meaningful for the list
/// it came from. Any operation that moves bytes invalidates it; such
/// operations return a fresh cursor instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    offset: Option<usize>,
}

impl Cursor {
    /// The position past the last record.
    pub const END: Cursor = Cursor { offset: None };

    #[must_use]
    pub const fn at(offset: usize) -> Self {
        Self {
            offset: Some(offset),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        self.offset
    }

    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.offset.is_none()
    }

    /// # Panics
    ///
    /// Panics if the cursor is `END`.
    pub(crate) fn expect_element(self) -> usize {
        match self.offset {
            Some(offset) => offset,
            None => panic!("cursor points past the last element"),
        }
    }
}

impl From<Option<usize>> for Cursor {
    fn from(offset: Option<usize>) -> Self {
        Self { offset }
    }
}

/// Offset of the record after the one at `offset`, or `None` past `last`.
pub(crate) fn advance<T: FlatForwardListTraits>(
    buffer: &[u8],
    last: Option<usize>,
    offset: usize,
) -> Option<usize> {
    if last == Some(offset) {
        return None;
    }
    match T::offset_to_next(&buffer[offset..]) {
        0 => None,
        next => Some(offset + next),
    }
}

/// Data bytes of the record at `offset`, padding excluded.
pub(crate) fn element_data<T: FlatForwardListTraits>(buffer: &[u8], offset: usize) -> &[u8] {
    let size = T::size(&buffer[offset..]);
    &buffer[offset..offset + size]
}

/// Iterator over the data bytes of every record in a list.
pub struct Iter<'a, T> {
    buffer: &'a [u8],
    last: Option<usize>,
    current: Option<usize>,
    _traits: PhantomData<fn() -> T>,
}

impl<'a, T: FlatForwardListTraits> Iter<'a, T> {
    pub(crate) fn new(buffer: &'a [u8], last: Option<usize>) -> Self {
        Self {
            buffer,
            last,
            current: last.map(|_| 0),
            _traits: PhantomData,
        }
    }
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer,
            last: self.last,
            current: self.current,
            _traits: PhantomData,
        }
    }
}

impl<'a, T: FlatForwardListTraits> Iterator for Iter<'a, T> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.current?;
        self.current = advance::<T>(self.buffer, self.last, offset);
        Some(element_data::<T>(self.buffer, offset))
    }
}

impl<T: FlatForwardListTraits> FusedIterator for Iter<'_, T> {}

/// Iterator over the cursors of every record in a list.
pub struct Cursors<'a, T> {
    inner: Iter<'a, T>,
}

impl<'a, T: FlatForwardListTraits> Cursors<'a, T> {
    pub(crate) fn new(buffer: &'a [u8], last: Option<usize>) -> Self {
        Self {
            inner: Iter::new(buffer, last),
        }
    }
}

impl<T> Clone for Cursors<'_, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: FlatForwardListTraits> Iterator for Cursors<'_, T> {
    type Item = Cursor;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.inner.current?;
        self.inner.current = advance::<T>(self.inner.buffer, self.inner.last, offset);
        Some(Cursor::at(offset))
    }
}

impl<T: FlatForwardListTraits> FusedIterator for Cursors<'_, T> {}
