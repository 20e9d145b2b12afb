#![cfg_attr(not(any(feature = "std", test)), no_std)]

//! Flat forward lists: variable-length records packed into one buffer.
//!
//! Many OS and wire APIs return heterogeneous entries in a single allocation,
//! each entry telling where the next one starts: extended attribute lists,
//! directory enumeration results, property lists. This crate provides:
//!
//! - `FlatForwardListTraits`: how to read the size and link of a record
//! - `validate`: walks an untrusted buffer without reading past its end
//! - `FlatForwardListRef`: a zero-copy view over a buffer owned elsewhere
//! - `FlatForwardList`: an owning container with insertion, removal, record
//!   resizing, sorting and merging
//!
//! Buffer layout: `[record][padding][record][padding]...[record]`
//!
//! Each record starts with a header defined by the traits. Self-linking
//! records store the distance to the next record (`0` for the last one),
//! self-sizing records are followed directly by the next record, rounded up
//! to the traits' alignment.
//!
//! # Example
//!
//! ```
//! use flat_forward_list::{FlatForwardList, FlatForwardListTraits, FlatListRead};
//!
//! /// `[next: u16][len: u16][payload; len]`
//! struct Entry;
//!
//! impl FlatForwardListTraits for Entry {
//!     const ALIGNMENT: usize = 2;
//!     const HAS_NEXT_OFFSET: bool = true;
//!
//!     fn minimum_size() -> usize {
//!         4
//!     }
//!
//!     fn size(header: &[u8]) -> usize {
//!         4 + usize::from(u16::from_le_bytes([header[2], header[3]]))
//!     }
//!
//!     fn next_offset(header: &[u8]) -> usize {
//!         usize::from(u16::from_le_bytes([header[0], header[1]]))
//!     }
//!
//!     fn set_next_offset(header: &mut [u8], offset: usize) {
//!         let offset = u16::try_from(offset).unwrap_or(u16::MAX);
//!         header[..2].copy_from_slice(&offset.to_le_bytes());
//!     }
//! }
//!
//! let mut list = FlatForwardList::<Entry>::new();
//! list.push_back(&[0, 0, 3, 0, b'a', b'b', b'c']).unwrap();
//! list.push_back(&[0, 0, 1, 0, b'z']).unwrap();
//!
//! let payloads: Vec<&[u8]> = list.iter().map(|entry| &entry[4..]).collect();
//! assert_eq!(payloads, vec![&b"abc"[..], &b"z"[..]]);
//!
//! // The first record is padded to an even length and linked to the second.
//! assert_eq!(list.element(list.begin())[..2], [8, 0]);
//! assert_eq!(list.used_size(), 8 + 5);
//! ```
//!
//! # Trust boundary
//!
//! Only `validate` and the operations built on it (`FlatForwardListRef::new`,
//! `FlatForwardList::attach_validated`, `FlatForwardList::assign`) accept
//! bytes of unknown origin. Everything else assumes a well-formed list and
//! treats violations as programmer errors, which panic.
//!
//! # `no_std` Compatibility
//!
//! The crate only needs `core` and `alloc`. Enable the `std` feature for
//! `std::error::Error` on `FlatListError`, and `logging` to emit diagnostics
//! through the `log` crate.

extern crate alloc;

#[macro_use]
mod logging;

mod access;
mod allocator;
mod capability;
mod cursor;
mod error;
mod list;
mod range;
mod traits;
mod validate;
mod view;

pub use access::FlatListRead;
pub use allocator::{BufferAllocator, Global};
pub use cursor::{Cursor, Cursors, Iter};
pub use error::FlatListError;
pub use list::{DetachedBuffer, FlatForwardList};
pub use range::{align_up, ElementRange, SizeWithPadding};
pub use traits::FlatForwardListTraits;
pub use validate::{validate, validate_structure, validate_with, Validation};
pub use view::FlatForwardListRef;
