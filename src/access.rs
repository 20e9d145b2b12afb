use crate::capability::TraitsExt;
use crate::cursor::{advance, element_data, Cursor, Cursors, Iter};
use crate::range::ElementRange;
use crate::traits::FlatForwardListTraits;
use crate::view::FlatForwardListRef;

/// Read-only navigation shared by `FlatForwardList` and `FlatForwardListRef`.
///
/// Implementors only expose their buffer and the offset of the last record;
/// everything else is derived from those two and the traits.
///
/// Traversal is forward-only: operations that locate a record by position or
/// look backwards (`len`, `find_element_before`, `find_element_at_offset`)
/// walk the list from the start.
pub trait FlatListRead {
    type Traits: FlatForwardListTraits;

    /// The whole buffer, including unused capacity.
    fn buffer(&self) -> &[u8];

    /// Offset of the last record, `None` when the list is empty.
    fn last_offset(&self) -> Option<usize>;

    fn is_empty(&self) -> bool {
        self.last_offset().is_none()
    }

    /// Counts the records. O(n).
    fn len(&self) -> usize {
        self.cursors().count()
    }

    fn begin(&self) -> Cursor {
        Cursor::from(self.last_offset().map(|_| 0))
    }

    fn last(&self) -> Cursor {
        Cursor::from(self.last_offset())
    }

    fn end(&self) -> Cursor {
        Cursor::END
    }

    /// # Panics
    ///
    /// Panics if `cursor` is `END`.
    fn next(&self, cursor: Cursor) -> Cursor {
        let offset = cursor.expect_element();
        Cursor::from(advance::<Self::Traits>(
            self.buffer(),
            self.last_offset(),
            offset,
        ))
    }

    /// Data bytes of the record at `cursor`, padding excluded.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is `END`.
    fn element(&self, cursor: Cursor) -> &[u8] {
        element_data::<Self::Traits>(self.buffer(), cursor.expect_element())
    }

    fn front(&self) -> Option<&[u8]> {
        self.last_offset().map(|_| self.element(Cursor::at(0)))
    }

    fn back(&self) -> Option<&[u8]> {
        self.last_offset().map(|last| self.element(Cursor::at(last)))
    }

    fn iter(&self) -> Iter<'_, Self::Traits> {
        Iter::new(self.buffer(), self.last_offset())
    }

    fn cursors(&self) -> Cursors<'_, Self::Traits> {
        Cursors::new(self.buffer(), self.last_offset())
    }

    /// Bytes from the buffer start to the end of the last record's data.
    fn used_size(&self) -> usize {
        self.last_offset().map_or(0, |last| {
            last + <Self::Traits as FlatForwardListTraits>::size(&self.buffer()[last..])
        })
    }

    fn total_capacity(&self) -> usize {
        self.buffer().len()
    }

    fn remaining_capacity(&self) -> usize {
        self.total_capacity() - self.used_size()
    }

    /// Offsets of the record at `cursor`. The last record has no padding.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is `END`.
    fn range(&self, cursor: Cursor) -> ElementRange {
        let start = cursor.expect_element();
        let header = &self.buffer()[start..];
        let size = <Self::Traits as FlatForwardListTraits>::size(header);
        if self.last_offset() == Some(start) {
            ElementRange::last(start, size)
        } else {
            let next = <Self::Traits as TraitsExt>::offset_to_next(header);
            ElementRange::new(start, start + size, start + next)
        }
    }

    /// Span from the start of `first` to the end of `last`, both included.
    ///
    /// # Panics
    ///
    /// Panics if either cursor is `END`.
    fn closed_range(&self, first: Cursor, last: Cursor) -> ElementRange {
        let first = self.range(first);
        let last = self.range(last);
        ElementRange::new(first.start, last.data_end, last.buffer_end)
    }

    /// Span from the start of `first` up to, not including, `end`.
    ///
    /// # Panics
    ///
    /// Panics if `first` is `END`.
    fn half_open_range(&self, first: Cursor, end: Cursor) -> ElementRange {
        let start = first.expect_element();
        match end.offset() {
            Some(end) => ElementRange::new(start, end, end),
            None => {
                let used = self.used_size();
                ElementRange::new(start, used, used)
            }
        }
    }

    /// Record preceding `cursor`; `END` for the first record. For `END`
    /// itself this is the last record. O(n).
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is not a record of this list.
    fn find_element_before(&self, cursor: Cursor) -> Cursor {
        let mut before = Cursor::END;
        for current in self.cursors() {
            if current == cursor {
                return before;
            }
            before = current;
        }
        assert!(cursor.is_end(), "cursor does not belong to the list");
        before
    }

    /// Record whose bytes, padding included, contain `offset`. O(n).
    fn find_element_at_offset(&self, offset: usize) -> Cursor {
        self.cursors()
            .find(|&cursor| self.range(cursor).contains(offset))
            .unwrap_or(Cursor::END)
    }

    /// Whether `cursor` is the start of one of the records. O(n).
    fn contains(&self, cursor: Cursor) -> bool {
        !cursor.is_end() && self.cursors().any(|current| current == cursor)
    }

    fn as_view(&self) -> FlatForwardListRef<'_, Self::Traits> {
        FlatForwardListRef::from_raw_parts(self.buffer(), self.last_offset())
    }

    /// View over the records from `first` to `last`, both included.
    ///
    /// Offsets in the returned view are relative to `first`.
    ///
    /// # Panics
    ///
    /// Panics if either cursor is `END` or `last` precedes `first`.
    fn sub_view(&self, first: Cursor, last: Cursor) -> FlatForwardListRef<'_, Self::Traits> {
        let span = self.closed_range(first, last);
        let last = last.expect_element();
        assert!(span.start <= last, "sub-view ends before it starts");
        FlatForwardListRef::from_raw_parts(
            &self.buffer()[span.start..span.data_end],
            Some(last - span.start),
        )
    }
}
