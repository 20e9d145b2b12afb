//! Walking untrusted buffers.
//!
//! This is the only place where bytes of unknown origin are interpreted as a
//! list. Everything that accepts a foreign buffer (view construction,
//! `attach_validated`, `assign`, `revalidate_data`) goes through here, and the
//! rest of the crate trusts the offsets it produces.

use crate::capability::TraitsExt;
use crate::traits::FlatForwardListTraits;

/// Outcome of walking a buffer.
///
/// | `is_valid` | `last_valid` | meaning                                    |
/// |------------|--------------|--------------------------------------------|
/// | `true`     | `None`       | empty buffer, a valid empty list           |
/// | `true`     | `Some(o)`    | well-formed list ending at offset `o`      |
/// | `false`    | `None`       | not even the first record is well-formed   |
/// | `false`    | `Some(o)`    | corrupt tail, `o` is the last good record  |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    pub is_valid: bool,
    pub last_valid: Option<usize>,
}

impl Validation {
    const fn valid(last_valid: Option<usize>) -> Self {
        Self {
            is_valid: true,
            last_valid,
        }
    }

    const fn invalid(last_valid: Option<usize>) -> Self {
        Self {
            is_valid: false,
            last_valid,
        }
    }
}

/// Validates `buffer` using the traits' own `validate` for every record.
#[must_use]
pub fn validate<T: FlatForwardListTraits>(buffer: &[u8]) -> Validation {
    validate_with::<T, _>(buffer, T::validate_element)
}

/// Validates only the list structure, skipping per-record checks.
#[must_use]
pub fn validate_structure<T: FlatForwardListTraits>(buffer: &[u8]) -> Validation {
    validate_with::<T, _>(buffer, |_, _| true)
}

/// Validates `buffer` with a caller-provided per-record check.
///
/// `element_validator` receives the number of bytes left in the buffer and the
/// bytes starting at the record.
pub fn validate_with<T, F>(buffer: &[u8], element_validator: F) -> Validation
where
    T: FlatForwardListTraits,
    F: FnMut(usize, &[u8]) -> bool,
{
    if buffer.is_empty() {
        return Validation::valid(None);
    }
    if T::HAS_NEXT_OFFSET {
        validate_linked::<T, F>(buffer, element_validator)
    } else {
        validate_sized::<T, F>(buffer, element_validator)
    }
}

/// Walk for self-linking records: the list must end with a zero link.
fn validate_linked<T, F>(buffer: &[u8], mut element_validator: F) -> Validation
where
    T: FlatForwardListTraits,
    F: FnMut(usize, &[u8]) -> bool,
{
    let minimum_size = T::minimum_size();
    let mut last_valid = None;
    let mut offset = 0;

    loop {
        let remaining = buffer.len() - offset;
        if remaining < minimum_size {
            trace!("record at {} is truncated: {} bytes left", offset, remaining);
            return Validation::invalid(last_valid);
        }

        let header = &buffer[offset..];
        let next_offset = T::next_offset(header);
        if next_offset > remaining || (next_offset != 0 && next_offset < minimum_size) {
            trace!("record at {} has bad next offset {}", offset, next_offset);
            return Validation::invalid(last_valid);
        }

        if !element_validator(remaining, header) {
            trace!("record at {} rejected by element validator", offset);
            return Validation::invalid(last_valid);
        }

        let size = T::size(header);
        if size < minimum_size || size > remaining || (next_offset != 0 && size > next_offset) {
            trace!("record at {} has bad size {}", offset, size);
            return Validation::invalid(last_valid);
        }

        last_valid = Some(offset);
        if next_offset == 0 {
            return Validation::valid(last_valid);
        }
        offset += next_offset;
    }
}

/// Walk for self-sizing records: the list ends where no further record fits.
fn validate_sized<T, F>(buffer: &[u8], mut element_validator: F) -> Validation
where
    T: FlatForwardListTraits,
    F: FnMut(usize, &[u8]) -> bool,
{
    let minimum_size = T::minimum_size();
    let mut last_valid = None;
    let mut offset = 0;

    loop {
        let remaining = buffer.len() - offset;
        // No terminator to wait for: a short remainder is just unused space.
        if remaining < minimum_size {
            return Validation::valid(last_valid);
        }

        let header = &buffer[offset..];
        if !element_validator(remaining, header) {
            trace!("record at {} rejected by element validator", offset);
            return Validation::invalid(last_valid);
        }

        let size = T::size(header);
        if size < minimum_size || size > remaining {
            trace!("record at {} has bad size {}", offset, size);
            return Validation::invalid(last_valid);
        }
        let next_offset = T::padded_size(size);
        if next_offset == 0 {
            return Validation::invalid(last_valid);
        }

        last_valid = Some(offset);
        if next_offset >= remaining {
            return Validation::valid(last_valid);
        }
        offset += next_offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `[next: u8][kind: u8]`, two bytes per record
    struct Link;

    impl FlatForwardListTraits for Link {
        const HAS_NEXT_OFFSET: bool = true;

        fn minimum_size() -> usize {
            2
        }

        fn size(_header: &[u8]) -> usize {
            2
        }

        fn next_offset(header: &[u8]) -> usize {
            usize::from(header[0])
        }
    }

    /// `[len: u8][kind: u8][payload; len]`
    struct Len;

    impl FlatForwardListTraits for Len {
        fn minimum_size() -> usize {
            2
        }

        fn size(header: &[u8]) -> usize {
            2 + usize::from(header[0])
        }
    }

    #[test]
    fn test_empty_buffer_is_valid_empty_list() {
        assert_eq!(validate::<Link>(&[]), Validation::valid(None));
        assert_eq!(validate::<Len>(&[]), Validation::valid(None));
    }

    #[test]
    fn test_linked_list_ends_at_zero_link() {
        let buffer = [2u8, 1, 2, 2, 0, 3, 0xEE];
        assert_eq!(validate::<Link>(&buffer), Validation::valid(Some(4)));
    }

    #[test]
    fn test_linked_list_without_terminator_is_invalid() {
        let buffer = [2u8, 1, 2, 2];
        assert_eq!(validate::<Link>(&buffer), Validation::invalid(Some(2)));
    }

    #[test]
    fn test_linked_link_past_end_is_invalid() {
        let buffer = [2u8, 1, 9, 2];
        assert_eq!(validate::<Link>(&buffer), Validation::invalid(Some(0)));
    }

    #[test]
    fn test_linked_link_shorter_than_header_is_invalid() {
        let buffer = [2u8, 1, 2, 2, 1, 3, 0, 0];
        assert_eq!(validate::<Link>(&buffer), Validation::invalid(Some(2)));
    }

    #[test]
    fn test_sized_short_tail_is_valid() {
        let buffer = [0u8, 7, 0, 8, 5];
        assert_eq!(validate::<Len>(&buffer), Validation::valid(Some(2)));
    }

    #[test]
    fn test_sized_record_past_end_is_invalid() {
        let buffer = [0u8, 7, 3, 8];
        assert_eq!(validate::<Len>(&buffer), Validation::invalid(Some(0)));
    }

    #[test]
    fn test_custom_validator_stops_the_walk() {
        let buffer = [0u8, 7, 0, 8, 0, 9];
        let result = validate_with::<Len, _>(&buffer, |_, header| header[1] != 8);
        assert_eq!(result, Validation::invalid(Some(0)));
        assert_eq!(validate_structure::<Len>(&buffer), Validation::valid(Some(4)));
    }
}
