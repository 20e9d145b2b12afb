//! Uniform access to self-linking and self-sizing record layouts.
//!
//! The rest of the crate never asks a `FlatForwardListTraits` implementation
//! for its link field directly. It goes through `TraitsExt`, which picks the
//! explicit next-offset when the traits declare one and derives it from the
//! padded record size otherwise.

use crate::range::{align_up, SizeWithPadding};
use crate::traits::FlatForwardListTraits;

pub(crate) trait TraitsExt: FlatForwardListTraits {
    fn padded_size(size: usize) -> usize {
        align_up(size, Self::ALIGNMENT)
    }

    fn size_with_padding(header: &[u8]) -> SizeWithPadding {
        SizeWithPadding::new(Self::size(header), Self::ALIGNMENT)
    }

    /// Distance to the next record. `0` can only come from an explicit link.
    fn offset_to_next(header: &[u8]) -> usize {
        if Self::HAS_NEXT_OFFSET {
            Self::next_offset(header)
        } else {
            Self::padded_size(Self::size(header))
        }
    }

    fn set_offset_to_next(header: &mut [u8], offset: usize) {
        if Self::HAS_NEXT_OFFSET {
            Self::set_next_offset(header, offset);
        }
    }

    fn validate_element(buffer_size: usize, header: &[u8]) -> bool {
        Self::validate(buffer_size, header)
    }
}

impl<T: FlatForwardListTraits + ?Sized> TraitsExt for T {}
