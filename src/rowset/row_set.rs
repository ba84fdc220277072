use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::debug;
use crate::collection::row_collection::RowCollection;
use crate::core::config::CollectionEnv;
use crate::core::error::Result;
use crate::schema::order::Probe;
use crate::schema::row::{Entry, RowSchema};

/// Row collection addressed by primary key.
///
/// `put` keeps at most one record per key across the sorted prefix and the
/// tail. Positional operations of the underlying collection stay reachable
/// through `Deref`; bulk loaders may `add_unique` directly when they already
/// guarantee distinct keys.
#[derive(Debug, Clone)]
pub struct RowSet {
    rows: RowCollection,
}

impl RowSet {
    pub fn new(schema: Arc<RowSchema>) -> Self {
        RowSet { rows: RowCollection::new(schema) }
    }

    pub fn with_capacity(schema: Arc<RowSchema>, capacity: usize) -> Result<Self> {
        Ok(RowSet { rows: RowCollection::with_capacity(schema, capacity)? })
    }

    pub fn with_env(schema: Arc<RowSchema>, capacity: usize, env: CollectionEnv) -> Result<Self> {
        Ok(RowSet { rows: RowCollection::with_env(schema, capacity, env)? })
    }

    /// Adopts a collection as-is; call `dedup_in_place` first if it may hold
    /// repeated keys
    pub fn from_collection(rows: RowCollection) -> Self {
        RowSet { rows }
    }

    pub fn import_from(schema: Arc<RowSchema>, blob: &[u8], env: CollectionEnv) -> Result<Self> {
        Ok(RowSet { rows: RowCollection::import_from(schema, blob, env)? })
    }

    pub fn into_collection(self) -> RowCollection {
        self.rows
    }

    /// Position of `key`. Sorts first when the unsorted tail has outgrown
    /// the resort limit, so repeated lookups do not keep paying for a linear
    /// tail scan.
    pub fn find(&mut self, key: &[u8]) -> Result<Option<usize>> {
        self.rows.schema().check_key(key)?;
        let tail = self.rows.len() - self.rows.sort_bound();
        if tail > self.rows.env().config.resort_limit {
            debug!(tail, "unsorted tail over resort limit, sorting before lookup");
            self.rows.sort();
        }
        Ok(self.locate(key))
    }

    /// Read-only lookup: binary search over the sorted prefix, then a scan of
    /// the tail. Never reorders.
    fn locate(&self, key: &[u8]) -> Option<usize> {
        let order = self.rows.schema().order().as_ref();
        let probe = Probe::new(order, key);

        let (mut lo, mut hi) = (0, self.rows.sort_bound());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match probe.cmp(order, self.rows.key_ref(mid)) {
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => return Some(mid),
            }
        }

        (self.rows.sort_bound()..self.rows.len())
            .find(|&i| probe.cmp(order, self.rows.key_ref(i)) == Ordering::Equal)
    }

    /// Copy of the record stored under `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.rows.schema().check_key(key)?;
        self.rows.touch_read();
        Ok(self.locate(key).map(|i| Entry::from_trusted(self.rows.schema().clone(), self.rows.record(i).to_vec())))
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.rows.schema().check_key(key)?;
        Ok(self.locate(key).is_some())
    }

    /// Insert-or-update. Returns the record that was replaced, if any.
    pub fn put(&mut self, record: &[u8]) -> Result<Option<Entry>> {
        self.rows.schema().check_record(record)?;
        let key = self.rows.schema().key_of(record);
        match self.find(key)? {
            Some(index) => {
                let previous = self.rows.get_at(index)?;
                self.rows.replace_same_key(index, record);
                Ok(Some(previous))
            }
            None => {
                self.rows.append(record)?;
                Ok(None)
            }
        }
    }

    pub fn put_entry(&mut self, entry: &Entry) -> Result<Option<Entry>> {
        self.put(entry.bytes())
    }

    /// Removes the record stored under `key`. Records inside the sorted
    /// prefix are removed with an order-preserving shift so the prefix stays
    /// searchable; tail records are swapped out in constant time.
    pub fn remove(&mut self, key: &[u8]) -> Result<Option<Entry>> {
        match self.find(key)? {
            Some(index) => {
                let keep_order = index < self.rows.sort_bound();
                self.rows.remove_at(index, keep_order).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Removes every listed key that is present; returns how many were removed
    pub fn delete_all<'k, I>(&mut self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'k [u8]>,
    {
        let mut removed = 0;
        for key in keys {
            if self.remove(key)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Lower-bound position of `key` within the sorted prefix: the index of
    /// the first prefix record whose key is not less than `key`
    pub fn binary_position(&self, key: &[u8]) -> usize {
        let order = self.rows.schema().order().as_ref();
        let probe = Probe::new(order, key);
        let (mut lo, mut hi) = (0, self.rows.sort_bound());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if probe.cmp(order, self.rows.key_ref(mid)) == Ordering::Greater {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Upper-bound position: first prefix record whose key is greater than `key`
    pub(crate) fn upper_position(&self, key: &[u8]) -> usize {
        let order = self.rows.schema().order().as_ref();
        let probe = Probe::new(order, key);
        let (mut lo, mut hi) = (0, self.rows.sort_bound());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if probe.cmp(order, self.rows.key_ref(mid)) == Ordering::Less {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }

    pub fn smallest_key(&mut self) -> Option<Vec<u8>> {
        self.rows.sort();
        self.rows.key_at(0).ok()
    }

    pub fn largest_key(&mut self) -> Option<Vec<u8>> {
        self.rows.sort();
        let last = self.rows.len().checked_sub(1)?;
        self.rows.key_at(last).ok()
    }
}

impl Deref for RowSet {
    type Target = RowCollection;

    fn deref(&self) -> &RowCollection {
        &self.rows
    }
}

impl DerefMut for RowSet {
    fn deref_mut(&mut self) -> &mut RowCollection {
        &mut self.rows
    }
}
