/// Describes the shape of one record type stored in a flat forward list.
///
/// Every operation receives the bytes starting at a record's header. The slice
/// may extend past the record; implementations must only look at the fields
/// they need. For `size` and `next_offset` the caller guarantees that at least
/// `minimum_size()` bytes are present.
///
/// Two layouts are supported:
///
/// - *Self-linking*: the header stores the distance to the next record, and a
///   distance of `0` marks the last record. Set `HAS_NEXT_OFFSET` to `true`
///   and implement `next_offset` and `set_next_offset`.
/// - *Self-sizing*: there is no link field. The next record starts right
///   after this record's data, rounded up to `ALIGNMENT`.
///
/// ```
/// use flat_forward_list::FlatForwardListTraits;
///
/// /// `[len: u16][payload; len]`
/// struct Chunk;
///
/// impl FlatForwardListTraits for Chunk {
///     fn minimum_size() -> usize {
///         2
///     }
///
///     fn size(header: &[u8]) -> usize {
///         2 + usize::from(u16::from_le_bytes([header[0], header[1]]))
///     }
/// }
/// ```
pub trait FlatForwardListTraits {
    /// Required start alignment of every record, relative to the buffer start.
    const ALIGNMENT: usize = 1;

    /// Whether the header carries an explicit next-offset field.
    const HAS_NEXT_OFFSET: bool = false;

    /// Smallest number of bytes needed to read the size and link fields.
    fn minimum_size() -> usize;

    /// Number of bytes the record's own data occupies, padding excluded.
    fn size(header: &[u8]) -> usize;

    /// Distance from this record to the next one; `0` for the last record.
    ///
    /// Only called when `HAS_NEXT_OFFSET` is `true`.
    fn next_offset(_header: &[u8]) -> usize {
        0
    }

    /// Only called when `HAS_NEXT_OFFSET` is `true`.
    fn set_next_offset(_header: &mut [u8], _offset: usize) {}

    /// Checks that the lengths declared by the record fit into `buffer_size`
    /// bytes starting at the record.
    fn validate(_buffer_size: usize, _header: &[u8]) -> bool {
        true
    }
}
