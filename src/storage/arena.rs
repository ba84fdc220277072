use crate::core::error::{Error, ErrorKind, Result};

/// Byte arena holding whole fixed-width records.
///
/// Every `index * width` computation in the crate goes through here. The
/// arena never tracks which slots are occupied; the owning collection does.
#[derive(Debug, Clone)]
pub struct RecordArena {
    bytes: Vec<u8>,
    width: usize,
}

impl RecordArena {
    pub fn new(width: usize) -> Self {
        debug_assert!(width > 0);
        RecordArena { bytes: Vec::new(), width }
    }

    pub fn with_capacity(width: usize, records: usize) -> Result<Self> {
        let mut arena = Self::new(width);
        arena.resize(records)?;
        Ok(arena)
    }

    /// Adopts raw bytes; trailing bytes that do not fill a record are dropped.
    pub fn from_bytes(width: usize, mut bytes: Vec<u8>) -> Self {
        let whole = bytes.len() / width * width;
        bytes.truncate(whole);
        RecordArena { bytes, width }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of record slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.len() / self.width
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    fn span(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.width;
        start..start + self.width
    }

    #[inline]
    pub fn record_at(&self, index: usize) -> &[u8] {
        &self.bytes[self.span(index)]
    }

    #[inline]
    pub fn record_at_mut(&mut self, index: usize) -> &mut [u8] {
        let span = self.span(index);
        &mut self.bytes[span]
    }

    #[inline]
    pub fn write_record_at(&mut self, index: usize, record: &[u8]) {
        let span = self.span(index);
        self.bytes[span].copy_from_slice(record);
    }

    /// Copies slot `from` over slot `to`
    pub fn copy_record(&mut self, from: usize, to: usize) {
        if from != to {
            let src = self.span(from);
            self.bytes.copy_within(src, to * self.width);
        }
    }

    /// Moves records `[from, end)` so they start at `to`
    pub fn shift_records(&mut self, from: usize, end: usize, to: usize) {
        if from != to && from < end {
            self.bytes.copy_within(from * self.width..end * self.width, to * self.width);
        }
    }

    pub fn zero_records(&mut self, from: usize, end: usize) {
        if from < end {
            self.bytes[from * self.width..end * self.width].fill(0);
        }
    }

    /// Bytes of the first `records` slots
    pub fn prefix_bytes(&self, records: usize) -> &[u8] {
        &self.bytes[..records * self.width]
    }

    /// Mutable bytes of slots `[from, end)`, for the sort engine
    pub fn range_bytes_mut(&mut self, from: usize, end: usize) -> &mut [u8] {
        &mut self.bytes[from * self.width..end * self.width]
    }

    /// Grows or shrinks to exactly `records` slots, zero-filling new slots.
    /// Growth reserves first so allocator refusal surfaces as an error.
    pub fn resize(&mut self, records: usize) -> Result<()> {
        let target = records.checked_mul(self.width).ok_or_else(|| {
            Error::new(
                ErrorKind::CapacityExhausted,
                format!("{} records of {} bytes overflow the address space", records, self.width),
            )
        })?;
        if target > self.bytes.len() {
            self.bytes.try_reserve_exact(target - self.bytes.len())?;
            self.bytes.resize(target, 0);
        } else {
            self.bytes.truncate(target);
            self.bytes.shrink_to_fit();
        }
        Ok(())
    }

    pub fn release(&mut self) {
        self.bytes = Vec::new();
    }
}

/// Swaps two records inside a flat record slice
#[inline]
pub fn swap_records(bytes: &mut [u8], width: usize, a: usize, b: usize) {
    if a == b {
        return;
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let (head, tail) = bytes.split_at_mut(hi * width);
    head[lo * width..(lo + 1) * width].swap_with_slice(&mut tail[..width]);
}
