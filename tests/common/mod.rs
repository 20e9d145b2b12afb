#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use flat_forward_list::{BufferAllocator, FlatForwardListTraits, FlatListError, FlatListRead, Global};

/// Self-linking record: `[next: u32][kind: u32][len: u32][payload; len]`,
/// aligned to 8 bytes.
pub struct Record;

pub const RECORD_HEADER: usize = 12;

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn write_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

impl FlatForwardListTraits for Record {
    const ALIGNMENT: usize = 8;
    const HAS_NEXT_OFFSET: bool = true;

    fn minimum_size() -> usize {
        RECORD_HEADER
    }

    fn size(header: &[u8]) -> usize {
        RECORD_HEADER + read_u32(header, 8) as usize
    }

    fn next_offset(header: &[u8]) -> usize {
        read_u32(header, 0) as usize
    }

    fn set_next_offset(header: &mut [u8], offset: usize) {
        write_u32(header, 0, u32::try_from(offset).unwrap());
    }

    fn validate(buffer_size: usize, header: &[u8]) -> bool {
        Self::size(header) <= buffer_size
    }
}

/// Bytes of a complete `Record` with a zero link.
pub fn record(kind: u32, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0; RECORD_HEADER + payload.len()];
    write_u32(&mut bytes, 4, kind);
    write_u32(&mut bytes, 8, payload.len() as u32);
    bytes[RECORD_HEADER..].copy_from_slice(payload);
    bytes
}

/// Writes a `Record` header into bytes prepared by the list.
pub fn write_record(bytes: &mut [u8], kind: u32, payload: &[u8]) {
    write_u32(bytes, 4, kind);
    write_u32(bytes, 8, payload.len() as u32);
    bytes[RECORD_HEADER..RECORD_HEADER + payload.len()].copy_from_slice(payload);
}

pub fn record_kind(element: &[u8]) -> u32 {
    read_u32(element, 4)
}

pub fn record_set_kind(element: &mut [u8], kind: u32) {
    write_u32(element, 4, kind);
}

pub fn record_link(element: &[u8]) -> u32 {
    read_u32(element, 0)
}

pub fn record_payload(element: &[u8]) -> &[u8] {
    &element[RECORD_HEADER..]
}

pub fn record_kinds<L: FlatListRead<Traits = Record>>(list: &L) -> Vec<u32> {
    list.iter().map(record_kind).collect()
}

pub fn record_payloads<L: FlatListRead<Traits = Record>>(list: &L) -> Vec<Vec<u8>> {
    list.iter().map(|e| record_payload(e).to_vec()).collect()
}

/// Lays records out by hand, with links, the way a foreign API would.
pub fn raw_records(records: &[(u32, &str)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    for (index, (kind, payload)) in records.iter().enumerate() {
        let start = buffer.len();
        buffer.extend_from_slice(&record(*kind, payload.as_bytes()));
        if index + 1 < records.len() {
            while buffer.len() % 8 != 0 {
                buffer.push(0);
            }
            let next = (buffer.len() - start) as u32;
            write_u32(&mut buffer, start, next);
        }
    }
    buffer
}

/// Self-sizing record: `[kind: u16][len: u16][payload; len]`, aligned to 4 bytes.
pub struct Tlv;

pub const TLV_HEADER: usize = 4;

impl FlatForwardListTraits for Tlv {
    const ALIGNMENT: usize = 4;

    fn minimum_size() -> usize {
        TLV_HEADER
    }

    fn size(header: &[u8]) -> usize {
        TLV_HEADER + usize::from(u16::from_le_bytes([header[2], header[3]]))
    }
}

pub fn tlv(kind: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(TLV_HEADER + payload.len());
    bytes.extend_from_slice(&kind.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

pub fn tlv_kind(element: &[u8]) -> u16 {
    u16::from_le_bytes([element[0], element[1]])
}

pub fn tlv_kinds<L: FlatListRead<Traits = Tlv>>(list: &L) -> Vec<u16> {
    list.iter().map(tlv_kind).collect()
}

/// Lays TLV records out back to back with zero padding.
pub fn raw_tlvs(records: &[(u16, &str)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    for (index, (kind, payload)) in records.iter().enumerate() {
        buffer.extend_from_slice(&tlv(*kind, payload.as_bytes()));
        if index + 1 < records.len() {
            while buffer.len() % 4 != 0 {
                buffer.push(0);
            }
        }
    }
    buffer
}

/// Checks the layout invariants every list must keep between operations.
pub fn assert_well_formed<L: FlatListRead>(list: &L) {
    assert!(list.used_size() <= list.total_capacity());
    match list.last_offset() {
        None => assert_eq!(list.used_size(), 0),
        Some(last) => {
            assert!(last < list.used_size());
            let used = list.used_size();
            let validation = flat_forward_list::validate::<L::Traits>(&list.buffer()[..used]);
            assert!(validation.is_valid);
            assert_eq!(validation.last_valid, Some(last));
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    live: Cell<usize>,
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    fail_after: Cell<Option<usize>>,
}

/// Allocator that counts live buffers and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct TrackingAllocator {
    counters: Rc<Counters>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.counters.live.get()
    }

    pub fn allocations(&self) -> usize {
        self.counters.allocations.get()
    }

    pub fn deallocations(&self) -> usize {
        self.counters.deallocations.get()
    }

    /// Lets `successes` more allocations through, then fails every one.
    pub fn fail_after(&self, successes: usize) {
        self.counters.fail_after.set(Some(successes));
    }

    pub fn fail_next(&self) {
        self.fail_after(0);
    }

    pub fn stop_failing(&self) {
        self.counters.fail_after.set(None);
    }

    /// A buffer the caller owns until it is attached to a list.
    pub fn allocate_for_test(&self, size: usize) -> Box<[u8]> {
        self.allocate(size).unwrap()
    }
}

impl BufferAllocator for TrackingAllocator {
    fn allocate(&self, size: usize) -> Result<Box<[u8]>, FlatListError> {
        match self.counters.fail_after.get() {
            Some(0) => return Err(FlatListError::AllocationFailed { requested: size }),
            Some(n) => self.counters.fail_after.set(Some(n - 1)),
            None => {}
        }
        let buffer = Global.allocate(size)?;
        self.counters.live.set(self.live() + 1);
        self.counters.allocations.set(self.allocations() + 1);
        Ok(buffer)
    }

    fn deallocate(&self, buffer: Box<[u8]>) {
        assert!(self.live() > 0, "deallocating a buffer that was never allocated");
        self.counters.live.set(self.live() - 1);
        self.counters.deallocations.set(self.deallocations() + 1);
        drop(buffer);
    }
}
