use std::cmp::Ordering;
use std::time::Instant;
use tracing::warn;
use crate::collection::row_collection::RowCollection;
use crate::core::error::{Error, ErrorKind, Result};

/// Deadline checks happen once per this many scanned records
const CLOCK_INTERVAL: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    Complete { removed: usize },
    /// The time budget ran out. Records past `scanned` were not examined and
    /// may still hold duplicates; the collection is sorted and usable.
    Partial { removed: usize, scanned: usize },
}

impl DedupOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, DedupOutcome::Complete { .. })
    }

    pub fn removed(&self) -> usize {
        match *self {
            DedupOutcome::Complete { removed } | DedupOutcome::Partial { removed, .. } => removed,
        }
    }

    /// Turns a partial pass into a `PartialCompletion` error
    pub fn into_result(self) -> Result<usize> {
        match self {
            DedupOutcome::Complete { removed } => Ok(removed),
            DedupOutcome::Partial { removed, scanned } => Err(Error::new(
                ErrorKind::PartialCompletion,
                format!("dedup stopped after {} records, {} removed", scanned, removed),
            )),
        }
    }
}

/// Result of `extract_duplicate_groups`
#[derive(Debug)]
pub struct DuplicateReport {
    /// One collection per run of equal keys, holding the records that were
    /// dropped from that run
    pub groups: Vec<RowCollection>,
    pub outcome: DedupOutcome,
}

impl RowCollection {
    /// Removes records whose primary key equals that of the record before
    /// them, keeping the lowest-positioned record of each run. Sorts first
    /// if needed.
    pub fn dedup_in_place(&mut self) -> Result<DedupOutcome> {
        self.uniq_pass(None)
    }

    /// Like `dedup_in_place`, but hands back what was removed, grouped by key
    pub fn extract_duplicate_groups(&mut self) -> Result<DuplicateReport> {
        let mut groups = Vec::new();
        let outcome = self.uniq_pass(Some(&mut groups))?;
        Ok(DuplicateReport { groups, outcome })
    }

    /// Single forward compaction over the sorted records. `write` is the
    /// number of kept records; `read` is the next record to examine.
    fn uniq_pass(&mut self, mut groups: Option<&mut Vec<RowCollection>>) -> Result<DedupOutcome> {
        self.sort();
        let n = self.len();
        if n < 2 {
            return Ok(DedupOutcome::Complete { removed: 0 });
        }

        let deadline = Instant::now() + self.env().config.dedup_budget;
        let schema = self.schema().clone();
        let mut group: Option<RowCollection> = None;
        let mut write = 1;
        let mut read = 1;

        while read < n {
            if read % CLOCK_INTERVAL == 0 && Instant::now() >= deadline {
                break;
            }
            let duplicate = schema.compare_records(self.record(write - 1), self.record(read)) == Ordering::Equal;
            if duplicate {
                if groups.is_some() {
                    let run = group.get_or_insert_with(|| self.empty_like());
                    if let Err(e) = run.append(self.record(read)) {
                        // `read` is kept, so the collection stays sorted and complete
                        self.close_gap(read, write, n);
                        warn!(scanned = read, total = n, error = %e, "duplicate grouping failed");
                        return Err(e);
                    }
                }
            } else {
                if let (Some(sink), Some(run)) = (groups.as_deref_mut(), group.take()) {
                    sink.push(run);
                }
                self.arena_mut().copy_record(read, write);
                write += 1;
            }
            read += 1;
        }
        if let (Some(sink), Some(run)) = (groups.as_deref_mut(), group.take()) {
            sink.push(run);
        }

        let removed = read - write;
        if read < n {
            self.close_gap(read, write, n);
            warn!(scanned = read, total = n, removed, "dedup time budget exhausted");
            Ok(DedupOutcome::Partial { removed, scanned: read })
        } else {
            self.set_bounds(write, write);
            Ok(DedupOutcome::Complete { removed })
        }
    }

    /// Moves the unexamined, still ordered records `[read, n)` down behind
    /// the `write` kept ones.
    fn close_gap(&mut self, read: usize, write: usize, n: usize) {
        self.arena_mut().shift_records(read, n, write);
        let count = write + (n - read);
        self.set_bounds(count, count);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use super::*;
    use crate::core::config::{CollectionConfig, CollectionEnv};
    use crate::memory::oracle::MemoryTracker;
    use crate::schema::order::NaturalOrder;
    use crate::schema::row::RowSchema;

    fn schema() -> Arc<RowSchema> {
        Arc::new(RowSchema::parse("byte[] key-2, Cardinal seq-2", Arc::new(NaturalOrder)).unwrap())
    }

    fn record(key: &[u8; 2], seq: u16) -> Vec<u8> {
        let mut r = key.to_vec();
        r.extend_from_slice(&seq.to_be_bytes());
        r
    }

    #[test]
    fn keeps_first_of_each_run() {
        let rows: Vec<Vec<u8>> = vec![
            record(b"aa", 0),
            record(b"bb", 1),
            record(b"bb", 2),
            record(b"cc", 3),
            record(b"cc", 4),
            record(b"cc", 5),
        ];
        let mut coll = RowCollection::from_records(schema(), &rows).unwrap();
        assert_eq!(coll.sort_bound(), 6);
        let outcome = coll.dedup_in_place().unwrap();
        assert_eq!(outcome, DedupOutcome::Complete { removed: 3 });
        assert_eq!(coll.len(), 3);
        assert_eq!(coll.get_at(1).unwrap().cardinal(1), Some(1));
        assert_eq!(coll.get_at(2).unwrap().cardinal(1), Some(3));
        assert!(coll.is_sorted());
    }

    #[test]
    fn groups_hold_removed_records() {
        let rows = vec![record(b"xx", 0), record(b"aa", 1), record(b"xx", 2), record(b"mm", 3), record(b"aa", 4), record(b"xx", 5)];
        let mut coll = RowCollection::from_records(schema(), &rows).unwrap();
        let report = coll.extract_duplicate_groups().unwrap();
        assert!(report.outcome.is_complete());
        assert_eq!(coll.len(), 3);
        let sizes: Vec<usize> = report.groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![1, 2]);
        assert_eq!(report.groups[0].key_at(0).unwrap(), b"aa");
        assert_eq!(report.groups[1].key_at(1).unwrap(), b"xx");
    }

    #[test]
    fn zero_budget_reports_partial_but_stays_valid() {
        let env = CollectionEnv::new(
            CollectionConfig { dedup_budget: Duration::ZERO, ..Default::default() },
            Arc::new(crate::memory::oracle::Unbounded),
            None,
        )
        .unwrap();
        let mut coll = RowCollection::with_env(schema(), 0, env).unwrap();
        for i in 0..10_000u16 {
            let key = (i / 2).to_be_bytes();
            coll.append(&record(&key, i)).unwrap();
        }
        let outcome = coll.dedup_in_place().unwrap();
        assert!(!outcome.is_complete());
        assert_eq!(outcome.removed(), 2048);
        assert_eq!(coll.len(), 10_000 - 2048);
        assert!(coll.is_sorted());
        assert_eq!(outcome.into_result().unwrap_err().kind, ErrorKind::PartialCompletion);
    }

    #[test]
    fn failed_grouping_leaves_collection_sorted() {
        let tracker = Arc::new(MemoryTracker::new(14));
        let env = CollectionEnv::default().with_memory(tracker);
        let schema = Arc::new(RowSchema::key_only(2, Arc::new(NaturalOrder)).unwrap());
        let mut coll = RowCollection::with_env(schema, 5, env).unwrap();
        for key in [b"aa", b"aa", b"aa", b"bb", b"bb"] {
            coll.append(key).unwrap();
        }

        let err = coll.extract_duplicate_groups().unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapacityExhausted);
        // The `aa` run was compacted before the `bb` group could not allocate
        assert_eq!(coll.len(), 3);
        assert_eq!(coll.sort_bound(), 3);
        assert_eq!(coll.records_bytes(), b"aabbbb");
        assert!(coll.is_sorted());

        // Plain dedup needs no allocation and finishes the job
        assert_eq!(coll.dedup_in_place().unwrap(), DedupOutcome::Complete { removed: 1 });
        assert_eq!(coll.records_bytes(), b"aabb");
    }
}
