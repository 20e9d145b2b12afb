/// Rounds `size` up to the next multiple of `alignment`.
///
/// An alignment of `0` or `1` means no padding. A size whose padded value
/// would exceed `usize::MAX` saturates to `usize::MAX`.
#[must_use]
pub const fn align_up(size: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return size;
    }
    match size % alignment {
        0 => size,
        rem => size.saturating_add(alignment - rem),
    }
}

/// A declared record size together with its alignment-padded footprint.
///
/// The declared size is what the record reports about itself, the padded size
/// is what it takes in the buffer when another record follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeWithPadding {
    size: usize,
    alignment: usize,
}

impl SizeWithPadding {
    #[must_use]
    pub const fn new(size: usize, alignment: usize) -> Self {
        Self { size, alignment }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn padded_size(&self) -> usize {
        align_up(self.size, self.alignment)
    }

    #[must_use]
    pub const fn padding_size(&self) -> usize {
        self.padded_size() - self.size
    }
}

/// Offsets describing one record, or a run of records, inside a buffer.
///
/// - `start`: offset of the first header byte
/// - `data_end`: one past the last byte of data
/// - `buffer_end`: start of whatever follows, i.e. `data_end` plus padding
///
/// For the last record of a list `data_end == buffer_end`: no padding is
/// reserved after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementRange {
    pub start: usize,
    pub data_end: usize,
    pub buffer_end: usize,
}

impl ElementRange {
    #[must_use]
    pub const fn new(start: usize, data_end: usize, buffer_end: usize) -> Self {
        Self {
            start,
            data_end,
            buffer_end,
        }
    }

    /// Range of a record that has nothing after it.
    #[must_use]
    pub const fn last(start: usize, data_size: usize) -> Self {
        Self::new(start, start + data_size, start + data_size)
    }

    #[must_use]
    pub const fn data_size(&self) -> usize {
        self.data_end - self.start
    }

    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_end - self.start
    }

    #[must_use]
    pub const fn padding_size(&self) -> usize {
        self.buffer_end - self.data_end
    }

    /// Whether `offset` falls anywhere in the record, padding included.
    #[must_use]
    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.buffer_end
    }

    #[must_use]
    pub const fn contains_data(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.data_end
    }

    /// Overwrites the padding bytes with `byte`.
    ///
    /// # Panics
    ///
    /// Panics if the range does not lie inside `buffer`.
    pub fn fill_padding(&self, buffer: &mut [u8], byte: u8) {
        buffer[self.data_end..self.buffer_end].fill(byte);
    }
}
