use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use crate::core::config::CollectionEnv;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::CollectionStats;
use crate::core::time;
use crate::parallel::quicksort::{is_ordered, sort_records, SortContext};
use crate::schema::row::{Entry, RowSchema};
use crate::storage::arena::RecordArena;

/// Growable store of fixed-width records.
///
/// Records `[0, sort_bound)` are ordered ascending by primary key; records
/// `[sort_bound, len)` form an unordered tail that `sort` folds back in.
/// Reads hand out copies, never references into the buffer.
pub struct RowCollection {
    schema: Arc<RowSchema>,
    env: CollectionEnv,
    arena: RecordArena,
    count: usize,
    sort_bound: usize,
    last_read: AtomicI64,       // Unix millis
    last_write: i64,            // Unix millis
}

impl RowCollection {
    pub fn new(schema: Arc<RowSchema>) -> Self {
        let width = schema.record_width();
        let now = Utc::now().timestamp_millis();
        RowCollection {
            schema,
            env: CollectionEnv::default(),
            arena: RecordArena::new(width),
            count: 0,
            sort_bound: 0,
            last_read: AtomicI64::new(now),
            last_write: now,
        }
    }

    pub fn with_capacity(schema: Arc<RowSchema>, capacity: usize) -> Result<Self> {
        Self::with_env(schema, capacity, CollectionEnv::default())
    }

    pub fn with_env(schema: Arc<RowSchema>, capacity: usize, env: CollectionEnv) -> Result<Self> {
        env.config.validate()?;
        let mut collection = RowCollection::new(schema);
        collection.env = env;
        collection.reserve_exact(capacity)?;
        Ok(collection)
    }

    /// Builds a collection from already-encoded records, keeping their order
    pub fn from_records<I>(schema: Arc<RowSchema>, records: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut collection = RowCollection::new(schema);
        for record in records {
            collection.append(record.as_ref())?;
        }
        Ok(collection)
    }

    /// Reassembles a collection from parts decoded out of an exported blob
    pub(crate) fn from_parts(
        schema: Arc<RowSchema>,
        env: CollectionEnv,
        arena: RecordArena,
        count: usize,
        sort_bound: usize,
        last_read: DateTime<Utc>,
        last_write: DateTime<Utc>,
    ) -> Self {
        debug_assert!(count <= arena.capacity());
        debug_assert!(sort_bound <= count);
        env.memory.record_alloc(arena.byte_len());
        RowCollection {
            schema,
            env,
            arena,
            count,
            sort_bound,
            last_read: AtomicI64::new(last_read.timestamp_millis()),
            last_write: last_write.timestamp_millis(),
        }
    }

    /// Empty collection sharing this one's schema and environment
    pub fn empty_like(&self) -> Self {
        let mut collection = RowCollection::new(self.schema.clone());
        collection.env = self.env.clone();
        collection
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    pub fn env(&self) -> &CollectionEnv {
        &self.env
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Record slots currently allocated
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub fn sort_bound(&self) -> usize {
        self.sort_bound
    }

    /// Bytes held by the record buffer
    pub fn mem(&self) -> usize {
        self.arena.byte_len()
    }

    pub fn last_read(&self) -> DateTime<Utc> {
        time::from_millis(self.last_read.load(AtomicOrdering::Relaxed))
    }

    pub fn last_write(&self) -> DateTime<Utc> {
        time::from_millis(self.last_write)
    }

    pub(crate) fn touch_read(&self) {
        self.last_read.store(Utc::now().timestamp_millis(), AtomicOrdering::Relaxed);
    }

    fn touch_write(&mut self) {
        self.last_write = Utc::now().timestamp_millis();
    }

    /// Guarantees room for `records` records, growing by the configured factor.
    ///
    /// The memory oracle is asked before allocating. If the grown size does
    /// not fit the reported headroom, an exact-size allocation is tried; if
    /// that does not fit either, nothing is allocated.
    pub fn ensure_capacity(&mut self, records: usize) -> Result<()> {
        let current = self.arena.capacity();
        if records <= current {
            return Ok(());
        }
        let grown = ((records as f64) * self.env.config.grow_factor).ceil() as usize;
        let grown = grown.max(records);

        let width = self.arena.width() as u64;
        let available = self.env.memory.available();
        // Overflow means no oracle could ever grant it
        let needed = |target: usize| (target as u64 - current as u64).checked_mul(width).unwrap_or(u64::MAX);
        let exact = needed(records);

        let target = if needed(grown) <= available {
            grown
        } else if exact <= available {
            warn!(
                requested = grown,
                granted = records,
                available,
                "memory headroom too small for growth slack, allocating exact size"
            );
            records
        } else {
            warn!(requested = records, available, "collection growth denied");
            return Err(Error::new(
                ErrorKind::CapacityExhausted,
                format!(
                    "growing to {} records needs {} bytes, only {} available",
                    records,
                    exact,
                    available
                ),
            ));
        };

        self.resize_arena(target)?;
        debug!(from = current, to = target, width, "collection grown");
        Ok(())
    }

    fn reserve_exact(&mut self, records: usize) -> Result<()> {
        if records <= self.arena.capacity() {
            return Ok(());
        }
        let needed = ((records - self.arena.capacity()) as u64)
            .checked_mul(self.arena.width() as u64)
            .unwrap_or(u64::MAX);
        if needed > self.env.memory.available() {
            return Err(Error::new(
                ErrorKind::CapacityExhausted,
                format!("initial capacity of {} records needs {} bytes", records, needed),
            ));
        }
        self.resize_arena(records)
    }

    fn resize_arena(&mut self, records: usize) -> Result<()> {
        let before = self.arena.byte_len();
        self.arena.resize(records)?;
        let after = self.arena.byte_len();
        if after > before {
            self.env.memory.record_alloc(after - before);
        } else {
            self.env.memory.record_free(before - after);
        }
        Ok(())
    }

    /// Drops growth slack when the memory oracle reports pressure.
    /// Returns whether anything was released.
    pub fn trim(&mut self) -> Result<bool> {
        if !self.env.memory.under_pressure() || self.arena.capacity() == self.count {
            return Ok(false);
        }
        let before = self.arena.capacity();
        self.resize_arena(self.count)?;
        release_free_memory();
        debug!(from = before, to = self.count, "collection trimmed under memory pressure");
        Ok(true)
    }

    #[inline]
    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.count {
            return Err(Error::index_out_of_range(index, self.count));
        }
        Ok(())
    }

    /// Borrowed record bytes; callers inside the crate must not hold them
    /// across a mutation.
    #[inline]
    pub(crate) fn record(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.count);
        self.arena.record_at(index)
    }

    #[inline]
    pub(crate) fn key_ref(&self, index: usize) -> &[u8] {
        self.schema.key_of(self.record(index))
    }

    /// Copy of the record at `index`; `RowSet::get` looks up by key instead
    pub fn get_at(&self, index: usize) -> Result<Entry> {
        self.check_index(index)?;
        self.touch_read();
        Ok(Entry::from_trusted(self.schema.clone(), self.record(index).to_vec()))
    }

    pub fn key_at(&self, index: usize) -> Result<Vec<u8>> {
        self.check_index(index)?;
        Ok(self.key_ref(index).to_vec())
    }

    /// Writes `record` at `index`. Writing at or past the end extends the
    /// collection (skipped slots are zeroed). Overwriting inside the sorted
    /// prefix shrinks the prefix to `index`.
    pub fn set(&mut self, index: usize, record: &[u8]) -> Result<()> {
        self.schema.check_record(record)?;
        if index >= self.count {
            let end = index.checked_add(1).ok_or_else(|| {
                Error::new(ErrorKind::CapacityExhausted, format!("index {} leaves no room to grow", index))
            })?;
            self.ensure_capacity(end)?;
            self.arena.zero_records(self.count, index);
            self.count = end;
        } else if index < self.sort_bound {
            self.sort_bound = index;
        }
        self.arena.write_record_at(index, record);
        self.touch_write();
        Ok(())
    }

    /// Overwrites a record whose key is unchanged, leaving the order intact
    pub(crate) fn replace_same_key(&mut self, index: usize, record: &[u8]) {
        debug_assert!(index < self.count);
        debug_assert_eq!(self.schema.compare_records(self.record(index), record), Ordering::Equal);
        self.arena.write_record_at(index, record);
        self.touch_write();
    }

    /// Appends without looking for an existing record with the same key.
    ///
    /// While the whole collection is sorted, a record that does not compare
    /// below the current last one extends the sorted prefix, so monotonic
    /// bulk loads never need a resort.
    pub fn append(&mut self, record: &[u8]) -> Result<()> {
        self.schema.check_record(record)?;
        self.ensure_capacity(self.count + 1)?;
        let extends_prefix = self.sort_bound == self.count
            && (self.count == 0
                || self.schema.compare_records(self.record(self.count - 1), record) != Ordering::Greater);
        self.arena.write_record_at(self.count, record);
        self.count += 1;
        if extends_prefix {
            self.sort_bound = self.count;
        }
        self.touch_write();
        Ok(())
    }

    /// Alias used by bulk loaders that guarantee key uniqueness themselves
    pub fn add_unique(&mut self, record: &[u8]) -> Result<()> {
        self.append(record)
    }

    /// Appends every record of `other`
    pub fn add_all(&mut self, other: &RowCollection) -> Result<()> {
        if !self.schema.is_compatible(&other.schema) {
            return Err(Error::new(
                ErrorKind::OrderMismatch,
                "cannot combine collections with different row layouts".to_string(),
            ));
        }
        self.ensure_capacity(self.count + other.count)?;
        for i in 0..other.count {
            self.append(other.record(i))?;
        }
        Ok(())
    }

    /// Removes the record at `index` and returns it.
    ///
    /// Unordered removal moves the last record into the hole in O(1) and cuts
    /// the sorted prefix back to `index` when the hole lies inside it.
    /// Ordered removal shifts the following records down in O(n) and keeps
    /// the prefix valid.
    pub fn remove_at(&mut self, index: usize, keep_order: bool) -> Result<Entry> {
        self.check_index(index)?;
        let removed = Entry::from_trusted(self.schema.clone(), self.record(index).to_vec());
        let last = self.count - 1;

        if keep_order {
            self.arena.shift_records(index + 1, self.count, index);
            if index < self.sort_bound {
                self.sort_bound -= 1;
            }
        } else if index == last {
            self.sort_bound = self.sort_bound.min(last);
        } else {
            self.arena.copy_record(last, index);
            if index < self.sort_bound {
                self.sort_bound = index;
            }
        }

        self.count = last;
        debug_assert!(self.sort_bound <= self.count);
        self.touch_write();
        Ok(removed)
    }

    /// Removes and returns the last record
    pub fn remove_one(&mut self) -> Option<Entry> {
        if self.count == 0 {
            return None;
        }
        self.remove_at(self.count - 1, true).ok()
    }

    /// Copy of the first `n` records (fewer if the collection is shorter)
    pub fn top(&self, n: usize) -> Result<RowCollection> {
        let n = n.min(self.count);
        let mut out = self.empty_like();
        out.reserve_exact(n)?;
        for i in 0..n {
            out.append(self.record(i))?;
        }
        Ok(out)
    }

    /// Forgets every record but keeps the allocation
    pub fn clear(&mut self) {
        self.count = 0;
        self.sort_bound = 0;
        self.touch_write();
    }

    /// Restores `sort_bound == len`. Short tails are binary-inserted into the
    /// prefix; longer ones go through the quicksort engine, on the sort
    /// executor when one is configured and the collection is large enough.
    pub fn sort(&mut self) {
        if self.sort_bound == self.count {
            return;
        }
        let ctx = SortContext::new(&self.schema, &self.env.config);
        let executor = self.env.executor.as_deref();
        let bytes = self.arena.range_bytes_mut(0, self.count);
        sort_records(bytes, self.sort_bound, &ctx, executor);
        self.sort_bound = self.count;
        debug_assert!(is_ordered(self.arena.prefix_bytes(self.count), &ctx));
    }

    /// Verifies the order instead of trusting `sort_bound`
    pub fn is_sorted(&self) -> bool {
        if self.sort_bound != self.count {
            return false;
        }
        let ctx = SortContext::new(&self.schema, &self.env.config);
        is_ordered(self.arena.prefix_bytes(self.count), &ctx)
    }

    /// Raw bytes of all occupied records, concatenated
    pub fn records_bytes(&self) -> &[u8] {
        self.arena.prefix_bytes(self.count)
    }

    pub(crate) fn arena_mut(&mut self) -> &mut RecordArena {
        &mut self.arena
    }

    /// Sets the occupied range after a bulk rewrite of the arena
    pub(crate) fn set_bounds(&mut self, count: usize, sort_bound: usize) {
        debug_assert!(count <= self.arena.capacity());
        debug_assert!(sort_bound <= count);
        self.count = count;
        self.sort_bound = sort_bound;
        self.touch_write();
    }

    pub fn iter(&self) -> impl Iterator<Item = Entry> + '_ {
        (0..self.count).map(move |i| Entry::from_trusted(self.schema.clone(), self.record(i).to_vec()))
    }

    pub fn stats(&self) -> CollectionStats {
        let allocated = self.arena.byte_len();
        let used = self.count * self.schema.record_width();
        CollectionStats {
            record_count: self.count,
            sort_bound: self.sort_bound,
            capacity: self.arena.capacity(),
            record_width: self.schema.record_width(),
            order_signature: String::from_utf8_lossy(&self.schema.signature()).into_owned(),
            allocated_bytes: allocated,
            used_bytes: used,
            utilization_percent: if allocated == 0 { 0.0 } else { used as f32 * 100.0 / allocated as f32 },
            last_read: self.last_read(),
            last_write: self.last_write(),
        }
    }
}

impl Clone for RowCollection {
    fn clone(&self) -> Self {
        self.env.memory.record_alloc(self.arena.byte_len());
        RowCollection {
            schema: self.schema.clone(),
            env: self.env.clone(),
            arena: self.arena.clone(),
            count: self.count,
            sort_bound: self.sort_bound,
            last_read: AtomicI64::new(self.last_read.load(AtomicOrdering::Relaxed)),
            last_write: self.last_write,
        }
    }
}

impl Drop for RowCollection {
    fn drop(&mut self) {
        self.env.memory.record_free(self.arena.byte_len());
        self.arena.release();
    }
}

impl std::fmt::Debug for RowCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCollection")
            .field("len", &self.count)
            .field("sort_bound", &self.sort_bound)
            .field("capacity", &self.arena.capacity())
            .field("width", &self.schema.record_width())
            .finish()
    }
}

/// Hint to the allocator to hand freed pages back to the OS
fn release_free_memory() {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    unsafe {
        libc::malloc_trim(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::oracle::{MemoryOracle, MemoryTracker};
    use crate::schema::order::NaturalOrder;

    fn schema(width: usize) -> Arc<RowSchema> {
        Arc::new(RowSchema::key_only(width, Arc::new(NaturalOrder)).unwrap())
    }

    #[test]
    fn monotonic_appends_stay_sorted() {
        let mut rows = RowCollection::new(schema(2));
        for key in [b"aa", b"ab", b"ab", b"zz"] {
            rows.append(key).unwrap();
        }
        assert_eq!(rows.sort_bound(), 4);
        rows.append(b"bb").unwrap();
        assert_eq!(rows.sort_bound(), 4);
        assert_eq!(rows.len(), 5);
        // Prefix no longer covers everything, later appends stay in the tail
        rows.append(b"zz").unwrap();
        assert_eq!(rows.sort_bound(), 4);
    }

    #[test]
    fn rejects_wrong_width() {
        let mut rows = RowCollection::new(schema(3));
        assert_eq!(rows.append(b"ab").unwrap_err().kind, ErrorKind::MalformedRecord);
        assert_eq!(rows.set(0, b"abcd").unwrap_err().kind, ErrorKind::MalformedRecord);
    }

    #[test]
    fn bounds_are_checked() {
        let rows = RowCollection::new(schema(1));
        assert_eq!(rows.get_at(0).unwrap_err().kind, ErrorKind::IndexOutOfRange);
        let mut rows = rows;
        assert_eq!(rows.remove_at(0, false).unwrap_err().kind, ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn set_extends_and_invalidates_prefix() {
        let mut rows = RowCollection::new(schema(1));
        rows.set(2, b"c").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.get_at(0).unwrap().bytes(), &[0u8]);
        rows.sort();
        assert_eq!(rows.sort_bound(), 3);

        rows.set(1, b"a").unwrap();
        assert_eq!(rows.sort_bound(), 1);
    }

    #[test]
    fn unordered_removal_cuts_prefix() {
        let mut rows = RowCollection::from_records(schema(1), [b"a", b"b", b"c", b"d"]).unwrap();
        assert_eq!(rows.sort_bound(), 4);
        let removed = rows.remove_at(1, false).unwrap();
        assert_eq!(removed.bytes(), b"b");
        assert_eq!(rows.records_bytes(), b"adc");
        assert_eq!(rows.sort_bound(), 1);
    }

    #[test]
    fn ordered_removal_keeps_prefix() {
        let mut rows = RowCollection::from_records(schema(1), [b"a", b"b", b"c", b"d"]).unwrap();
        rows.remove_at(1, true).unwrap();
        assert_eq!(rows.records_bytes(), b"acd");
        assert_eq!(rows.sort_bound(), 3);
        assert!(rows.is_sorted());
    }

    #[test]
    fn removing_last_keeps_prefix() {
        let mut rows = RowCollection::from_records(schema(1), [b"a", b"b"]).unwrap();
        rows.remove_at(1, false).unwrap();
        assert_eq!(rows.sort_bound(), 1);
        assert!(rows.is_sorted());
        assert_eq!(rows.remove_one().unwrap().bytes(), b"a");
        assert!(rows.remove_one().is_none());
    }

    #[test]
    fn growth_follows_grow_factor() {
        let mut rows = RowCollection::new(schema(4));
        rows.ensure_capacity(10).unwrap();
        assert_eq!(rows.capacity(), 14);
        rows.ensure_capacity(14).unwrap();
        assert_eq!(rows.capacity(), 14);
    }

    #[test]
    fn growth_denied_without_headroom() {
        let tracker = Arc::new(MemoryTracker::new(100));
        let env = CollectionEnv::default().with_memory(tracker.clone());
        let mut rows = RowCollection::with_env(schema(10), 0, env).unwrap();
        for i in 0..10u8 {
            rows.append(&[i; 10]).unwrap();
        }
        // 100 bytes used, exact-size fallback kept the last growth inside the limit
        assert_eq!(tracker.current_usage(), rows.mem());
        let err = rows.append(&[42; 10]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapacityExhausted);
        assert_eq!(rows.len(), 10);
        for i in 0..10u8 {
            assert_eq!(rows.get_at(i as usize).unwrap().bytes(), &[i; 10]);
        }
    }

    #[test]
    fn trim_only_under_pressure() {
        let tracker = Arc::new(MemoryTracker::with_threshold(1_000, 0.5));
        let env = CollectionEnv::default().with_memory(tracker.clone());
        let mut rows = RowCollection::with_env(schema(10), 0, env).unwrap();
        rows.append(&[1; 10]).unwrap();
        rows.ensure_capacity(20).unwrap();
        assert_eq!(rows.capacity(), 28);
        assert!(!rows.trim().unwrap());

        tracker.record_alloc(400);
        assert!(rows.trim().unwrap());
        assert_eq!(rows.capacity(), 1);
        assert_eq!(tracker.current_usage(), 400 + 10);
        assert_eq!(rows.get_at(0).unwrap().bytes(), &[1; 10]);
    }

    #[test]
    fn drop_releases_tracked_memory() {
        let tracker = Arc::new(MemoryTracker::new(10_000));
        {
            let env = CollectionEnv::default().with_memory(tracker.clone());
            let mut rows = RowCollection::with_env(schema(8), 16, env).unwrap();
            rows.append(&[0; 8]).unwrap();
            assert_eq!(tracker.current_usage(), 128);
        }
        assert_eq!(tracker.current_usage(), 0);
    }

    #[test]
    fn top_copies_leading_records() {
        let rows = RowCollection::from_records(schema(1), [b"c", b"a", b"b"]).unwrap();
        let top = rows.top(2).unwrap();
        assert_eq!(top.records_bytes(), b"ca");
        assert_eq!(rows.top(10).unwrap().len(), 3);
    }

    #[test]
    fn huge_index_is_capacity_exhausted() {
        let mut rows = RowCollection::from_records(schema(4), [b"abcd"]).unwrap();
        for index in [usize::MAX / 2, usize::MAX / 4 + 1, usize::MAX] {
            let err = rows.set(index, b"wxyz").unwrap_err();
            assert_eq!(err.kind, ErrorKind::CapacityExhausted);
        }
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.records_bytes(), b"abcd");

        let err = rows.ensure_capacity(usize::MAX / 3).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapacityExhausted);
        assert!(RowCollection::with_capacity(schema(4), usize::MAX / 2).is_err());
    }
}
