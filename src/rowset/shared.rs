use std::sync::Arc;
use bytes::Bytes;
use parking_lot::RwLock;
use crate::collection::uniq::DedupOutcome;
use crate::core::error::Result;
use crate::rowset::row_set::RowSet;
use crate::schema::row::Entry;

/// A `RowSet` behind a reader/writer lock, for callers that share one set
/// between threads. Lookups take the read lock and run concurrently; every
/// mutation (including the resort a mutating `find` may trigger) takes the
/// write lock.
#[derive(Debug, Clone)]
pub struct SharedRowSet {
    inner: Arc<RwLock<RowSet>>,
}

impl SharedRowSet {
    pub fn new(set: RowSet) -> Self {
        SharedRowSet { inner: Arc::new(RwLock::new(set)) }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.inner.read().get(key)
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.inner.read().has(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Serialized copy taken under the read lock
    pub fn snapshot_export(&self) -> Result<Bytes> {
        self.inner.read().export()
    }

    pub fn put(&self, record: &[u8]) -> Result<Option<Entry>> {
        self.inner.write().put(record)
    }

    pub fn remove(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.inner.write().remove(key)
    }

    pub fn sort(&self) {
        self.inner.write().sort();
    }

    pub fn dedup(&self) -> Result<DedupOutcome> {
        self.inner.write().dedup_in_place()
    }

    pub fn with_read<R>(&self, f: impl FnOnce(&RowSet) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn with_write<R>(&self, f: impl FnOnce(&mut RowSet) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Unwraps the set if this is the last handle
    pub fn into_inner(self) -> std::result::Result<RowSet, SharedRowSet> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| SharedRowSet { inner })
    }
}
