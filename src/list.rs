use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::mem;

use crate::access::FlatListRead;
use crate::allocator::{BufferAllocator, Global, PendingBuffer};
use crate::capability::TraitsExt;
use crate::cursor::{Cursor, Iter};
use crate::error::FlatListError;
use crate::traits::FlatForwardListTraits;
use crate::validate::{validate, Validation};
use crate::view::FlatForwardListRef;

/// Whether an operation may replace the buffer with a bigger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Growth {
    Allowed,
    Forbidden,
}

/// How an operation gets the room it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CapacityPlan {
    InPlace,
    Reallocate(usize),
}

/// A buffer taken out of a list with `FlatForwardList::detach`.
#[derive(Debug)]
pub struct DetachedBuffer {
    pub buffer: Box<[u8]>,
    /// Offset of the last record, `None` if the list was empty
    pub last: Option<usize>,
    /// Bytes up to the end of the last record's data
    pub used_size: usize,
}

/// An owning flat forward list.
///
/// Records live back to back in a single buffer obtained from `A`. Every
/// record except the last one is followed by padding up to `T::ALIGNMENT`.
/// The buffer grows to exactly the size an operation needs; use
/// `resize_buffer` to reserve ahead.
///
/// Operations that may reallocate have a `try_` twin which fails with
/// `FlatListError::InsufficientCapacity` instead.
///
/// Construction callbacks have the shape `FnOnce(&mut [u8]) -> Result<(), E>`.
/// They receive the zero-filled bytes of the new record and must leave a
/// header whose `size` lies between `T::minimum_size()` and the requested
/// size. Link fields are written by the list. If a callback fails, the list
/// is left as it was and the error is returned.
pub struct FlatForwardList<T: FlatForwardListTraits, A: BufferAllocator = Global> {
    buffer: Box<[u8]>,
    last: Option<usize>,
    allocator: A,
    _traits: PhantomData<fn() -> T>,
}

impl<T: FlatForwardListTraits> FlatForwardList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot be allocated.
    pub fn with_capacity(capacity: usize) -> Result<Self, FlatListError> {
        Self::with_capacity_in(capacity, Global)
    }
}

impl<T: FlatForwardListTraits> Default for FlatForwardList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FlatForwardListTraits, A: BufferAllocator> FlatForwardList<T, A> {
    #[must_use]
    pub fn new_in(allocator: A) -> Self {
        Self {
            buffer: Box::default(),
            last: None,
            allocator,
            _traits: PhantomData,
        }
    }

    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot be allocated.
    pub fn with_capacity_in(capacity: usize, allocator: A) -> Result<Self, FlatListError> {
        let mut list = Self::new_in(allocator);
        list.resize_buffer(capacity)?;
        Ok(list)
    }

    /// Copies a list out of an untrusted buffer.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::InvalidBuffer` if `data` is not a well-formed
    /// list, or `FlatListError::AllocationFailed`.
    pub fn from_buffer_in(data: &[u8], allocator: A) -> Result<Self, FlatListError> {
        let validation = validate::<T>(data);
        if !validation.is_valid {
            return Err(FlatListError::InvalidBuffer {
                last_valid: validation.last_valid,
            });
        }
        let mut list = Self::new_in(allocator);
        list.copy_from(data, validation.last_valid)?;
        Ok(list)
    }

    /// Copies the records of a view into a new list.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot be allocated.
    pub fn from_view_in(
        view: FlatForwardListRef<'_, T>,
        allocator: A,
    ) -> Result<Self, FlatListError> {
        let mut list = Self::new_in(allocator);
        list.copy_from(view.buffer(), view.last_offset())?;
        Ok(list)
    }

    /// Copies the list into a buffer of exactly `used_size()` bytes.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot be allocated.
    pub fn try_clone(&self) -> Result<Self, FlatListError>
    where
        A: Clone,
    {
        Self::from_view_in(self.as_view(), self.allocator.clone())
    }

    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Mutable data bytes of the record at `cursor`.
    ///
    /// Changing the record's size or link fields through this slice breaks the
    /// list until `revalidate_data` is called.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is `END`.
    pub fn element_mut(&mut self, cursor: Cursor) -> &mut [u8] {
        let start = cursor.expect_element();
        let size = T::size(&self.buffer[start..]);
        &mut self.buffer[start..start + size]
    }

    /// Replaces the content with a copy of an untrusted buffer.
    ///
    /// Returns `false` and leaves the list empty, keeping its buffer, if
    /// `data` is not a well-formed list. Use `validate` to find out where it
    /// breaks.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot be allocated.
    pub fn assign(&mut self, data: &[u8]) -> Result<bool, FlatListError> {
        let validation = validate::<T>(data);
        if !validation.is_valid {
            self.erase_all();
            return Ok(false);
        }
        self.copy_from(data, validation.last_valid)?;
        Ok(true)
    }

    /// Takes ownership of `buffer` without validating it.
    ///
    /// `last` must be the offset of the last record of a well-formed list in
    /// `buffer`, or `None`. The previous buffer is released.
    ///
    /// # Panics
    ///
    /// Panics if the last record does not fit into `buffer`.
    pub fn attach(&mut self, buffer: Box<[u8]>, last: Option<usize>) {
        if let Some(last) = last {
            assert!(
                last + T::minimum_size() <= buffer.len()
                    && last + T::size(&buffer[last..]) <= buffer.len(),
                "last element at {last} does not fit into a buffer of {} bytes",
                buffer.len()
            );
        }
        debug!("attaching buffer of {} bytes", buffer.len());
        self.replace_buffer(buffer);
        self.last = last;
        if let Some(last) = last {
            T::set_offset_to_next(&mut self.buffer[last..], 0);
        }
    }

    /// Takes ownership of `buffer` after validating its first `used_size` bytes.
    ///
    /// Returns `false` if validation failed; the list then owns the buffer but
    /// is empty.
    ///
    /// # Panics
    ///
    /// Panics if `used_size` exceeds the buffer length.
    pub fn attach_validated(&mut self, buffer: Box<[u8]>, used_size: usize) -> bool {
        assert!(
            used_size <= buffer.len(),
            "used size {used_size} exceeds buffer of {} bytes",
            buffer.len()
        );
        let validation = validate::<T>(&buffer[..used_size]);
        debug!(
            "attaching buffer of {} bytes, valid: {}",
            buffer.len(),
            validation.is_valid
        );
        self.replace_buffer(buffer);
        self.last = if validation.is_valid {
            validation.last_valid
        } else {
            None
        };
        validation.is_valid
    }

    /// Gives up ownership of the buffer, leaving the list empty and bufferless.
    pub fn detach(&mut self) -> DetachedBuffer {
        let used_size = self.used_size();
        let buffer = mem::take(&mut self.buffer);
        debug!("detaching buffer of {} bytes", buffer.len());
        DetachedBuffer {
            buffer,
            last: self.last.take(),
            used_size,
        }
    }

    /// Removes every record and releases the buffer.
    pub fn clear(&mut self) {
        self.last = None;
        self.release_buffer();
    }

    /// Removes every record, keeping the buffer.
    pub fn erase_all(&mut self) {
        self.last = None;
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Re-walks the buffer after records were edited through `element_mut`,
    /// and truncates the list to its last trustworthy record.
    pub fn revalidate_data(&mut self) -> Validation {
        let scope = if T::HAS_NEXT_OFFSET {
            self.buffer.len()
        } else {
            self.used_size().min(self.buffer.len())
        };
        let validation = validate::<T>(&self.buffer[..scope]);
        self.last = validation.last_valid;
        if let Some(last) = self.last {
            T::set_offset_to_next(&mut self.buffer[last..], 0);
        }
        validation
    }

    // ------------------------------------------------------------------
    // Appending and inserting
    // ------------------------------------------------------------------

    /// Appends a copy of `data`, which must hold a complete record.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot grow.
    pub fn push_back(&mut self, data: &[u8]) -> Result<Cursor, FlatListError> {
        self.emplace_back(data.len(), copy_record(data))
    }

    /// # Errors
    ///
    /// Returns `FlatListError::InsufficientCapacity` if the record does not fit.
    pub fn try_push_back(&mut self, data: &[u8]) -> Result<Cursor, FlatListError> {
        self.try_emplace_back(data.len(), copy_record(data))
    }

    /// Appends a record of `size` bytes built by `init`.
    ///
    /// # Errors
    ///
    /// Returns the error of `init`, or `FlatListError::AllocationFailed`
    /// converted into `E`.
    ///
    /// # Panics
    ///
    /// Panics if `size` is below `T::minimum_size()` or `init` leaves a header
    /// whose size is outside `[T::minimum_size(), size]`.
    pub fn emplace_back<F, E>(&mut self, size: usize, init: F) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        self.emplace_back_impl(size, Growth::Allowed, init)
    }

    /// # Errors
    ///
    /// Returns the error of `init`, or `FlatListError::InsufficientCapacity`
    /// converted into `E`.
    pub fn try_emplace_back<F, E>(&mut self, size: usize, init: F) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        self.emplace_back_impl(size, Growth::Forbidden, init)
    }

    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot grow.
    pub fn push_front(&mut self, data: &[u8]) -> Result<Cursor, FlatListError> {
        self.emplace_front(data.len(), copy_record(data))
    }

    /// # Errors
    ///
    /// Returns `FlatListError::InsufficientCapacity` if the record does not fit.
    pub fn try_push_front(&mut self, data: &[u8]) -> Result<Cursor, FlatListError> {
        self.try_emplace_front(data.len(), copy_record(data))
    }

    /// Prepends a record, shifting every existing record.
    ///
    /// # Errors
    ///
    /// See `emplace_back`.
    pub fn emplace_front<F, E>(&mut self, size: usize, init: F) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        let begin = self.begin();
        self.emplace_impl(begin, size, Growth::Allowed, init)
    }

    /// # Errors
    ///
    /// See `try_emplace_back`.
    pub fn try_emplace_front<F, E>(&mut self, size: usize, init: F) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        let begin = self.begin();
        self.emplace_impl(begin, size, Growth::Forbidden, init)
    }

    /// Inserts a copy of `data` before `cursor`.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot grow.
    pub fn insert(&mut self, cursor: Cursor, data: &[u8]) -> Result<Cursor, FlatListError> {
        self.emplace(cursor, data.len(), copy_record(data))
    }

    /// # Errors
    ///
    /// Returns `FlatListError::InsufficientCapacity` if the record does not fit.
    pub fn try_insert(&mut self, cursor: Cursor, data: &[u8]) -> Result<Cursor, FlatListError> {
        self.try_emplace(cursor, data.len(), copy_record(data))
    }

    /// Builds a record before `cursor`; at `END` this is `emplace_back`.
    ///
    /// Returns the cursor of the new record.
    ///
    /// # Errors
    ///
    /// See `emplace_back`.
    pub fn emplace<F, E>(&mut self, cursor: Cursor, size: usize, init: F) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        self.emplace_impl(cursor, size, Growth::Allowed, init)
    }

    /// # Errors
    ///
    /// See `try_emplace_back`.
    pub fn try_emplace<F, E>(&mut self, cursor: Cursor, size: usize, init: F) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        self.emplace_impl(cursor, size, Growth::Forbidden, init)
    }

    fn emplace_back_impl<F, E>(
        &mut self,
        size: usize,
        growth: Growth,
        init: F,
    ) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        Self::check_requested_size(size);
        let used = self.used_size();
        let start = self
            .last
            .map_or(0, |last| last + T::padded_size(T::size(&self.buffer[last..])));
        let end = start + size;

        match self.plan_capacity(end, growth)? {
            CapacityPlan::InPlace => {
                let element = &mut self.buffer[start..end];
                element.fill(0);
                init(element)?;
                Self::check_written_size(&self.buffer[start..end], size);
            }
            CapacityPlan::Reallocate(capacity) => {
                let mut pending = PendingBuffer::allocate(&self.allocator, capacity)?;
                let bytes = pending.bytes_mut();
                bytes[..used].copy_from_slice(&self.buffer[..used]);
                init(&mut bytes[start..end])?;
                Self::check_written_size(&bytes[start..end], size);
                let buffer = pending.commit();
                self.replace_buffer(buffer);
            }
        }

        if let Some(last) = self.last {
            T::set_offset_to_next(&mut self.buffer[last..], start - last);
        }
        T::set_offset_to_next(&mut self.buffer[start..], 0);
        self.last = Some(start);
        Ok(Cursor::at(start))
    }

    fn emplace_impl<F, E>(
        &mut self,
        cursor: Cursor,
        size: usize,
        growth: Growth,
        init: F,
    ) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        let Some(start) = cursor.offset() else {
            return self.emplace_back_impl(size, growth, init);
        };
        Self::check_requested_size(size);
        self.check_element_cursor(start);

        let reserved = T::padded_size(size);
        let used = self.used_size();
        let new_used = used + reserved;

        match self.plan_capacity(new_used, growth)? {
            CapacityPlan::InPlace => {
                self.buffer.copy_within(start..used, start + reserved);
                let element = &mut self.buffer[start..start + size];
                element.fill(0);
                if let Err(err) = init(element) {
                    self.buffer.copy_within(start + reserved..new_used, start);
                    return Err(err);
                }
                Self::check_written_size(&self.buffer[start..start + size], size);
            }
            CapacityPlan::Reallocate(capacity) => {
                let mut pending = PendingBuffer::allocate(&self.allocator, capacity)?;
                let bytes = pending.bytes_mut();
                bytes[..start].copy_from_slice(&self.buffer[..start]);
                bytes[start + reserved..new_used].copy_from_slice(&self.buffer[start..used]);
                init(&mut bytes[start..start + size])?;
                Self::check_written_size(&bytes[start..start + size], size);
                let buffer = pending.commit();
                self.replace_buffer(buffer);
            }
        }

        self.last = self.last.map(|last| last + reserved);
        self.settle_element(start, start + reserved, new_used);
        Ok(Cursor::at(start))
    }

    // ------------------------------------------------------------------
    // Removing
    // ------------------------------------------------------------------

    /// Removes the first record by shifting the rest of the list left.
    ///
    /// # Panics
    ///
    /// Panics if the list is empty.
    pub fn pop_front(&mut self) {
        let last = self.expect_last("pop_front");
        if last == 0 {
            self.last = None;
            return;
        }
        let second = T::offset_to_next(&self.buffer);
        let used = self.used_size();
        self.buffer.copy_within(second..used, 0);
        self.last = Some(last - second);
    }

    /// Removes the last record. O(n): the list has no backward links.
    ///
    /// # Panics
    ///
    /// Panics if the list is empty.
    pub fn pop_back(&mut self) {
        let last = self.expect_last("pop_back");
        let before = self.find_element_before(Cursor::at(last));
        self.truncate_after(before);
    }

    /// Removes the record at `cursor` and returns the cursor of the record
    /// that followed it, `END` if it was the last one.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is `END`.
    pub fn erase(&mut self, cursor: Cursor) -> Cursor {
        let start = cursor.expect_element();
        self.check_element_cursor(start);
        if self.last == Some(start) {
            self.pop_back();
            return Cursor::END;
        }
        let next = start + T::offset_to_next(&self.buffer[start..]);
        self.erase_range(cursor, Cursor::at(next))
    }

    /// Removes the records in `[first, end)` and returns the cursor of the
    /// record now at `first`, or `END`.
    ///
    /// # Panics
    ///
    /// Panics if `first` is `END` or `end` precedes `first`.
    pub fn erase_range(&mut self, first: Cursor, end: Cursor) -> Cursor {
        let start = first.expect_element();
        self.check_element_cursor(start);
        match end.offset() {
            None => {
                let before = self.find_element_before(first);
                self.truncate_after(before);
                Cursor::END
            }
            Some(stop) => {
                assert!(start <= stop, "erase range ends before it starts");
                if start == stop {
                    return first;
                }
                let used = self.used_size();
                self.buffer.copy_within(stop..used, start);
                self.last = self.last.map(|last| last - (stop - start));
                first
            }
        }
    }

    /// Removes the record following `before` and returns the cursor of the
    /// record that now follows `before`.
    ///
    /// # Panics
    ///
    /// Panics if `before` is `END` or the last record.
    pub fn erase_after(&mut self, before: Cursor) -> Cursor {
        let next = self.next(before);
        assert!(!next.is_end(), "no element after the last one");
        self.erase(next)
    }

    /// Removes the records strictly between `before` and `end`.
    ///
    /// # Panics
    ///
    /// Panics if `before` is `END`.
    pub fn erase_after_half_closed(&mut self, before: Cursor, end: Cursor) -> Cursor {
        let first = self.next(before);
        if first == end || first.is_end() {
            return end;
        }
        self.erase_range(first, end)
    }

    /// Removes every record after `before`, making it the last one.
    ///
    /// # Panics
    ///
    /// Panics if `before` is `END`.
    pub fn erase_after_to_end(&mut self, before: Cursor) -> Cursor {
        let start = before.expect_element();
        self.check_element_cursor(start);
        self.truncate_after(before);
        Cursor::END
    }

    /// Removes every record for which `pred` returns `true`. Returns the
    /// number of removed records.
    pub fn remove_if<P>(&mut self, mut pred: P) -> usize
    where
        P: FnMut(&[u8]) -> bool,
    {
        let mut removed = 0;
        let mut cursor = self.begin();
        while !cursor.is_end() {
            if !pred(self.element(cursor)) {
                cursor = self.next(cursor);
                continue;
            }
            let mut run_end = self.next(cursor);
            removed += 1;
            while !run_end.is_end() && pred(self.element(run_end)) {
                run_end = self.next(run_end);
                removed += 1;
            }
            let resume = self.erase_range(cursor, run_end);
            // `pred` already accepted the record that ended the run.
            cursor = if resume.is_end() { resume } else { self.next(resume) };
        }
        removed
    }

    /// Collapses runs of consecutive records for which `eq` holds into their
    /// first record. Returns the number of removed records.
    pub fn unique<P>(&mut self, mut eq: P) -> usize
    where
        P: FnMut(&[u8], &[u8]) -> bool,
    {
        let mut removed = 0;
        let mut cursor = self.begin();
        while !cursor.is_end() {
            let run_start = self.next(cursor);
            let mut run_end = run_start;
            while !run_end.is_end() && eq(self.element(cursor), self.element(run_end)) {
                run_end = self.next(run_end);
                removed += 1;
            }
            if run_start != run_end {
                self.erase_range(run_start, run_end);
            }
            cursor = self.next(cursor);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Resizing
    // ------------------------------------------------------------------

    /// Changes the size of the record at `cursor` to `new_size` bytes and
    /// lets `update` rewrite it. A size of `0` erases the record.
    ///
    /// `update` sees the record's current bytes, truncated or zero-extended to
    /// `new_size`, and must leave a header reporting at most `new_size`. If it
    /// fails the list is left byte for byte as it was.
    ///
    /// Returns the cursor of the resized record, or what `erase` returns.
    ///
    /// # Errors
    ///
    /// Returns the error of `update`, or `FlatListError::AllocationFailed`
    /// converted into `E`.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is `END` or `new_size` is non-zero and below
    /// `T::minimum_size()`.
    pub fn element_resize<F, E>(
        &mut self,
        cursor: Cursor,
        new_size: usize,
        update: F,
    ) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        self.element_resize_impl(cursor, new_size, Growth::Allowed, update)
    }

    /// # Errors
    ///
    /// Returns the error of `update`, `FlatListError::InsufficientCapacity`,
    /// or `FlatListError::AllocationFailed` if the record cannot be saved
    /// for rollback, converted into `E`.
    pub fn try_element_resize<F, E>(
        &mut self,
        cursor: Cursor,
        new_size: usize,
        update: F,
    ) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        self.element_resize_impl(cursor, new_size, Growth::Forbidden, update)
    }

    /// Grows the record at `cursor` by `size_to_add` bytes.
    ///
    /// # Errors
    ///
    /// See `element_resize`.
    pub fn element_add_size<F, E>(
        &mut self,
        cursor: Cursor,
        size_to_add: usize,
        update: F,
    ) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        let start = cursor.expect_element();
        let size = T::size(&self.buffer[start..]);
        self.element_resize(cursor, size + size_to_add, update)
    }

    fn element_resize_impl<F, E>(
        &mut self,
        cursor: Cursor,
        new_size: usize,
        growth: Growth,
        update: F,
    ) -> Result<Cursor, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: From<FlatListError>,
    {
        let start = cursor.expect_element();
        self.check_element_cursor(start);
        if new_size == 0 {
            return Ok(self.erase(cursor));
        }
        Self::check_requested_size(new_size);

        let is_last = self.last == Some(start);
        let used = self.used_size();
        let old_size = T::size(&self.buffer[start..]);
        let old_end = if is_last {
            used
        } else {
            start + T::offset_to_next(&self.buffer[start..])
        };
        let reserved_end = if is_last {
            start + new_size
        } else {
            start + T::padded_size(new_size)
        };
        let new_data_end = start + new_size;

        if reserved_end <= old_end {
            let saved = Self::save_bytes(&self.buffer[start..old_end])?;
            if new_size > old_size {
                self.buffer[start + old_size..new_data_end].fill(0);
            }
            if let Err(err) = update(&mut self.buffer[start..new_data_end]) {
                self.buffer[start..old_end].copy_from_slice(&saved);
                return Err(err);
            }
            Self::check_written_size(&self.buffer[start..new_data_end], new_size);
            if !is_last {
                self.settle_element(start, old_end, used);
            }
            return Ok(cursor);
        }

        let delta = reserved_end - old_end;
        let new_used = used + delta;
        match self.plan_capacity(new_used, growth)? {
            CapacityPlan::InPlace => {
                let saved = Self::save_bytes(&self.buffer[start..old_end])?;
                self.buffer.copy_within(old_end..used, reserved_end);
                self.buffer[start + old_size..new_data_end].fill(0);
                if let Err(err) = update(&mut self.buffer[start..new_data_end]) {
                    self.buffer.copy_within(reserved_end..new_used, old_end);
                    self.buffer[start..old_end].copy_from_slice(&saved);
                    return Err(err);
                }
                Self::check_written_size(&self.buffer[start..new_data_end], new_size);
            }
            CapacityPlan::Reallocate(capacity) => {
                let mut pending = PendingBuffer::allocate(&self.allocator, capacity)?;
                let bytes = pending.bytes_mut();
                bytes[..start + old_size].copy_from_slice(&self.buffer[..start + old_size]);
                bytes[reserved_end..new_used].copy_from_slice(&self.buffer[old_end..used]);
                update(&mut bytes[start..new_data_end])?;
                Self::check_written_size(&bytes[start..new_data_end], new_size);
                let buffer = pending.commit();
                self.replace_buffer(buffer);
            }
        }

        if !is_last {
            self.last = self.last.map(|last| last + delta);
            self.settle_element(start, reserved_end, new_used);
        }
        Ok(cursor)
    }

    /// Copies a record aside so a failed callback can be rolled back.
    fn save_bytes(bytes: &[u8]) -> Result<Vec<u8>, FlatListError> {
        let mut saved = Vec::new();
        saved
            .try_reserve_exact(bytes.len())
            .map_err(|_| FlatListError::AllocationFailed {
                requested: bytes.len(),
            })?;
        saved.extend_from_slice(bytes);
        Ok(saved)
    }

    /// Reallocates the buffer to exactly `new_capacity` bytes.
    ///
    /// Shrinking below `used_size()` drops the records that no longer fit;
    /// shrinking below the first record empties the list.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot be
    /// allocated; the list is unchanged then.
    pub fn resize_buffer(&mut self, new_capacity: usize) -> Result<(), FlatListError> {
        if new_capacity == self.buffer.len() {
            return Ok(());
        }
        debug!(
            "resizing buffer from {} to {} bytes",
            self.buffer.len(),
            new_capacity
        );

        let used = self.used_size();
        let new_last = if new_capacity >= used {
            self.last
        } else {
            self.cursors()
                .map(|cursor| self.range(cursor))
                .take_while(|range| range.data_end <= new_capacity)
                .last()
                .map(|range| range.start)
        };

        if new_capacity == 0 {
            self.last = None;
            self.release_buffer();
            return Ok(());
        }

        let kept = new_last.map_or(0, |last| last + T::size(&self.buffer[last..]));
        let mut pending = PendingBuffer::allocate(&self.allocator, new_capacity)?;
        let bytes = pending.bytes_mut();
        bytes[..kept].copy_from_slice(&self.buffer[..kept]);
        if let Some(last) = new_last {
            T::set_offset_to_next(&mut bytes[last..], 0);
        }
        let buffer = pending.commit();
        self.replace_buffer(buffer);
        self.last = new_last;
        Ok(())
    }

    /// Reallocates the buffer to exactly `used_size()` bytes.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed` if the buffer cannot be allocated.
    pub fn shrink_to_fit(&mut self) -> Result<(), FlatListError> {
        self.resize_buffer(self.used_size())
    }

    /// Overwrites the padding after every record with `byte`, and with
    /// `fill_tail` also the unused capacity after the last record.
    ///
    /// Use it before handing the buffer to a less trusted consumer, so stale
    /// bytes do not leak.
    pub fn fill_padding(&mut self, byte: u8, fill_tail: bool) {
        let mut cursor = self.begin();
        while !cursor.is_end() {
            let range = self.range(cursor);
            range.fill_padding(&mut self.buffer, byte);
            cursor = self.next(cursor);
        }
        if fill_tail {
            let used = self.used_size();
            self.buffer[used..].fill(byte);
        }
    }

    // ------------------------------------------------------------------
    // Reordering
    // ------------------------------------------------------------------

    /// Stable sort by `cmp`, applied to the records' data bytes.
    ///
    /// The records are copied into a new buffer of the same capacity.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed`; the list is unchanged then.
    pub fn sort<C>(&mut self, mut cmp: C) -> Result<(), FlatListError>
    where
        C: FnMut(&[u8], &[u8]) -> Ordering,
    {
        if self.last.unwrap_or(0) == 0 {
            return Ok(());
        }
        let mut elements: Vec<&[u8]> = self.iter().collect();
        elements.sort_by(|a, b| cmp(a, b));
        let (buffer, last) = Self::pack(&self.allocator, self.buffer.len(), &elements)?;
        drop(elements);
        self.replace_buffer(buffer);
        self.last = last;
        Ok(())
    }

    /// Reverses the order of the records.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed`; the list is unchanged then.
    pub fn reverse(&mut self) -> Result<(), FlatListError> {
        if self.last.unwrap_or(0) == 0 {
            return Ok(());
        }
        let mut elements: Vec<&[u8]> = self.iter().collect();
        elements.reverse();
        let (buffer, last) = Self::pack(&self.allocator, self.buffer.len(), &elements)?;
        drop(elements);
        self.replace_buffer(buffer);
        self.last = last;
        Ok(())
    }

    /// Merges the records of `other` into this list. Both lists must be sorted
    /// by `cmp`; on ties records of `self` come first. `other` is left empty.
    ///
    /// # Errors
    ///
    /// Returns `FlatListError::AllocationFailed`; both lists are unchanged then.
    pub fn merge<C>(&mut self, other: &mut Self, mut cmp: C) -> Result<(), FlatListError>
    where
        C: FnMut(&[u8], &[u8]) -> Ordering,
    {
        if other.is_empty() {
            return Ok(());
        }

        let mut ours = self.iter().peekable();
        let mut theirs = other.iter().peekable();
        let mut merged: Vec<&[u8]> = Vec::new();
        loop {
            let take_theirs = match (ours.peek(), theirs.peek()) {
                (Some(a), Some(b)) => cmp(b, a) == Ordering::Less,
                (None, Some(_)) => true,
                (Some(_), None) => false,
                (None, None) => break,
            };
            let next = if take_theirs {
                theirs.next()
            } else {
                ours.next()
            };
            merged.extend(next);
        }

        let (buffer, last) = Self::pack(&self.allocator, 0, &merged)?;
        drop(merged);
        self.replace_buffer(buffer);
        self.last = last;
        other.erase_all();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn plan_capacity(
        &self,
        required: usize,
        growth: Growth,
    ) -> Result<CapacityPlan, FlatListError> {
        if required <= self.buffer.len() {
            Ok(CapacityPlan::InPlace)
        } else if growth == Growth::Forbidden {
            Err(FlatListError::InsufficientCapacity {
                requested: required,
                available: self.buffer.len(),
            })
        } else {
            Ok(CapacityPlan::Reallocate(required))
        }
    }

    /// Swaps in `buffer` and returns the previous one to the allocator.
    fn replace_buffer(&mut self, buffer: Box<[u8]>) {
        let old = mem::replace(&mut self.buffer, buffer);
        if !old.is_empty() {
            self.allocator.deallocate(old);
        }
    }

    fn release_buffer(&mut self) {
        self.replace_buffer(Box::default());
    }

    /// Makes `before` the last record, or empties the list for `END`.
    fn truncate_after(&mut self, before: Cursor) {
        match before.offset() {
            None => self.last = None,
            Some(offset) => {
                T::set_offset_to_next(&mut self.buffer[offset..], 0);
                self.last = Some(offset);
            }
        }
    }

    /// Shrinks the footprint of the non-last record at `start`, which currently
    /// extends to `tail_start`, to its padded size and links it to the tail.
    fn settle_element(&mut self, start: usize, tail_start: usize, used: usize) {
        let end = start + T::padded_size(T::size(&self.buffer[start..]));
        if end < tail_start {
            self.buffer.copy_within(tail_start..used, end);
            self.last = self.last.map(|last| last - (tail_start - end));
        }
        T::set_offset_to_next(&mut self.buffer[start..], end - start);
    }

    /// Replaces the content with the records of `data` up to `last`.
    fn copy_from(&mut self, data: &[u8], last: Option<usize>) -> Result<(), FlatListError> {
        let Some(last) = last else {
            self.erase_all();
            return Ok(());
        };
        let used = last + T::size(&data[last..]);
        let mut pending = PendingBuffer::allocate(&self.allocator, used)?;
        let bytes = pending.bytes_mut();
        bytes.copy_from_slice(&data[..used]);
        T::set_offset_to_next(&mut bytes[last..], 0);
        let buffer = pending.commit();
        self.replace_buffer(buffer);
        self.last = Some(last);
        Ok(())
    }

    /// Lays `elements` out in a new buffer of at least `capacity` bytes.
    fn pack(
        allocator: &A,
        capacity: usize,
        elements: &[&[u8]],
    ) -> Result<(Box<[u8]>, Option<usize>), FlatListError> {
        let required = elements.split_last().map_or(0, |(last, rest)| {
            rest.iter()
                .map(|element| T::padded_size(element.len()))
                .sum::<usize>()
                + last.len()
        });
        let mut pending = PendingBuffer::allocate(allocator, capacity.max(required))?;
        let bytes = pending.bytes_mut();
        let mut offset = 0;
        let mut last = None;
        for element in elements {
            if let Some(previous) = last {
                T::set_offset_to_next(&mut bytes[previous..], offset - previous);
            }
            bytes[offset..offset + element.len()].copy_from_slice(element);
            T::set_offset_to_next(&mut bytes[offset..], 0);
            last = Some(offset);
            offset += T::padded_size(element.len());
        }
        Ok((pending.commit(), last))
    }

    fn expect_last(&self, operation: &str) -> usize {
        match self.last {
            Some(last) => last,
            None => panic!("{operation} on an empty list"),
        }
    }

    fn check_requested_size(size: usize) {
        assert!(
            size >= T::minimum_size(),
            "element size {size} is below the minimum of {}",
            T::minimum_size()
        );
    }

    fn check_element_cursor(&self, start: usize) {
        assert!(
            self.last.is_some_and(|last| start <= last),
            "cursor at {start} is outside the list"
        );
    }

    fn check_written_size(element: &[u8], reserved: usize) {
        let size = T::size(element);
        assert!(
            size >= T::minimum_size() && size <= reserved,
            "element reports size {size}, expected between {} and {reserved}",
            T::minimum_size()
        );
    }
}

impl<T: FlatForwardListTraits, A: BufferAllocator> FlatListRead for FlatForwardList<T, A> {
    type Traits = T;

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn last_offset(&self) -> Option<usize> {
        self.last
    }
}

impl<T: FlatForwardListTraits, A: BufferAllocator> Drop for FlatForwardList<T, A> {
    fn drop(&mut self) {
        self.release_buffer();
    }
}

impl<T: FlatForwardListTraits, A: BufferAllocator> fmt::Debug for FlatForwardList<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatForwardList")
            .field("last", &self.last)
            .field("used_size", &self.used_size())
            .field("total_capacity", &self.buffer.len())
            .finish()
    }
}

impl<'a, T: FlatForwardListTraits, A: BufferAllocator> IntoIterator for &'a FlatForwardList<T, A> {
    type Item = &'a [u8];
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Init callback copying a complete record.
fn copy_record(data: &[u8]) -> impl FnOnce(&mut [u8]) -> Result<(), FlatListError> + '_ {
    move |element: &mut [u8]| {
        element.copy_from_slice(data);
        Ok(())
    }
}
