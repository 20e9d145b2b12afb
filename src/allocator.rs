use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::FlatListError;

/// Source of the buffers owned by a `FlatForwardList`.
///
/// The list hands every buffer it obtained from `allocate` back to
/// `deallocate` on the same allocator. Buffers received through `attach` are
/// released the same way.
pub trait BufferAllocator {
    /// Returns a zero-filled buffer of exactly `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the memory is not available.
    fn allocate(&self, size: usize) -> Result<Box<[u8]>, FlatListError>;

    fn deallocate(&self, buffer: Box<[u8]>) {
        drop(buffer);
    }
}

/// The global heap, with allocation failures reported instead of aborting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Global;

impl BufferAllocator for Global {
    fn allocate(&self, size: usize) -> Result<Box<[u8]>, FlatListError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| FlatListError::AllocationFailed { requested: size })?;
        buffer.resize(size, 0);
        Ok(buffer.into_boxed_slice())
    }
}

impl<A: BufferAllocator + ?Sized> BufferAllocator for &A {
    fn allocate(&self, size: usize) -> Result<Box<[u8]>, FlatListError> {
        (**self).allocate(size)
    }

    fn deallocate(&self, buffer: Box<[u8]>) {
        (**self).deallocate(buffer);
    }
}

/// A freshly allocated buffer that is not yet owned by a list.
///
/// Dropping it without `commit` returns the buffer to the allocator, so a
/// failing callback or a panic between allocation and commit leaks nothing.
pub(crate) struct PendingBuffer<'a, A: BufferAllocator> {
    allocator: &'a A,
    buffer: Option<Box<[u8]>>,
}

impl<'a, A: BufferAllocator> PendingBuffer<'a, A> {
    pub(crate) fn allocate(allocator: &'a A, size: usize) -> Result<Self, FlatListError> {
        let buffer = allocator.allocate(size)?;
        debug!("allocated buffer of {} bytes", buffer.len());
        Ok(Self {
            allocator,
            buffer: Some(buffer),
        })
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or_default()
    }

    pub(crate) fn commit(mut self) -> Box<[u8]> {
        self.buffer.take().unwrap_or_default()
    }
}

impl<A: BufferAllocator> Drop for PendingBuffer<'_, A> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            debug!("discarding uncommitted buffer of {} bytes", buffer.len());
            self.allocator.deallocate(buffer);
        }
    }
}
