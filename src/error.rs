use thiserror::Error;

/// Error types for `FlatForwardList` operations
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum FlatListError {
    /// The allocator could not provide a buffer of the requested size
    #[error("Allocation failed: unable to allocate {requested} bytes")]
    AllocationFailed {
        /// Number of bytes requested from the allocator
        requested: usize,
    },
    /// A non-reallocating operation needs more room than the buffer has
    #[error("Insufficient capacity: requested {requested} bytes, but only {available} bytes available")]
    InsufficientCapacity {
        /// Total number of bytes the operation needs
        requested: usize,
        /// Total capacity of the buffer
        available: usize,
    },
    /// The buffer does not encode a well-formed list
    #[error("Invalid buffer: last well-formed element at {last_valid:?}")]
    InvalidBuffer {
        /// Offset of the last trustworthy element, if any
        last_valid: Option<usize>,
    },
}
