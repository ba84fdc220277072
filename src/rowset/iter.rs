use crate::rowset::row_set::RowSet;
use crate::schema::row::Entry;

/// Position window over a set's sorted prefix. Ascending cursors consume
/// from `lo`, descending ones from `hi`.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    lo: usize,
    hi: usize,
    ascending: bool,
}

impl Cursor {
    fn new(set: &RowSet, ascending: bool, start: Option<&[u8]>) -> Self {
        let bound = set.sort_bound();
        match (start, ascending) {
            (None, _) => Cursor { lo: 0, hi: bound, ascending },
            (Some(key), true) => Cursor { lo: set.binary_position(key), hi: bound, ascending },
            // Descending from `key` starts at the last record not above it
            (Some(key), false) => Cursor { lo: 0, hi: set.upper_position(key), ascending },
        }
    }

    fn front(&mut self) -> Option<usize> {
        (self.lo < self.hi).then(|| {
            self.lo += 1;
            self.lo - 1
        })
    }

    fn back(&mut self) -> Option<usize> {
        (self.lo < self.hi).then(|| {
            self.hi -= 1;
            self.hi
        })
    }

    fn step(&mut self) -> Option<usize> {
        if self.ascending { self.front() } else { self.back() }
    }

    fn step_back(&mut self) -> Option<usize> {
        if self.ascending { self.back() } else { self.front() }
    }

    fn remaining(&self) -> usize {
        self.hi - self.lo
    }
}

/// Ordered traversal over the records of a [`RowSet`].
///
/// Only the sorted prefix is visited; `RowSet::rows` sorts before handing
/// one out. Cheap to clone, and `resume_at` spawns a sibling cursor that
/// resumes at another key without touching the set.
#[derive(Debug, Clone)]
pub struct RowIter<'a> {
    set: &'a RowSet,
    cursor: Cursor,
}

impl<'a> RowIter<'a> {
    pub fn new(set: &'a RowSet, ascending: bool, start: Option<&[u8]>) -> Self {
        RowIter { set, cursor: Cursor::new(set, ascending, start) }
    }

    pub fn is_ascending(&self) -> bool {
        self.cursor.ascending
    }

    /// Repositions this iterator at `key`, keeping its direction
    pub fn restart_at(&mut self, key: &[u8]) {
        self.cursor = Cursor::new(self.set, self.cursor.ascending, Some(key));
    }

    /// New iterator over the same set and direction, starting at `key`
    pub fn resume_at(&self, key: &[u8]) -> Self {
        RowIter::new(self.set, self.cursor.ascending, Some(key))
    }

    pub fn keys(self) -> KeyIter<'a> {
        KeyIter { set: self.set, cursor: self.cursor }
    }

    fn entry(&self, index: usize) -> Entry {
        Entry::from_trusted(self.set.schema().clone(), self.set.record(index).to_vec())
    }
}

impl Iterator for RowIter<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.cursor.step().map(|i| self.entry(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.cursor.remaining();
        (n, Some(n))
    }
}

impl DoubleEndedIterator for RowIter<'_> {
    fn next_back(&mut self) -> Option<Entry> {
        self.cursor.step_back().map(|i| self.entry(i))
    }
}

impl ExactSizeIterator for RowIter<'_> {}

/// Primary keys in order; the key-only twin of [`RowIter`]
#[derive(Debug, Clone)]
pub struct KeyIter<'a> {
    set: &'a RowSet,
    cursor: Cursor,
}

impl<'a> KeyIter<'a> {
    pub fn new(set: &'a RowSet, ascending: bool, start: Option<&[u8]>) -> Self {
        KeyIter { set, cursor: Cursor::new(set, ascending, start) }
    }

    pub fn restart_at(&mut self, key: &[u8]) {
        self.cursor = Cursor::new(self.set, self.cursor.ascending, Some(key));
    }

    pub fn resume_at(&self, key: &[u8]) -> Self {
        KeyIter::new(self.set, self.cursor.ascending, Some(key))
    }
}

impl<'a> Iterator for KeyIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let set = self.set;
        self.cursor.step().map(|i| set.key_ref(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.cursor.remaining();
        (n, Some(n))
    }
}

impl<'a> DoubleEndedIterator for KeyIter<'a> {
    fn next_back(&mut self) -> Option<&'a [u8]> {
        let set = self.set;
        self.cursor.step_back().map(|i| set.key_ref(i))
    }
}

impl ExactSizeIterator for KeyIter<'_> {}

impl RowSet {
    /// Sorts, then iterates records from `start` (or the first/last key)
    pub fn rows(&mut self, ascending: bool, start: Option<&[u8]>) -> RowIter<'_> {
        self.sort();
        self.touch_read();
        RowIter::new(self, ascending, start)
    }

    pub fn keys(&mut self, ascending: bool, start: Option<&[u8]>) -> KeyIter<'_> {
        self.sort();
        self.touch_read();
        KeyIter::new(self, ascending, start)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::schema::order::NaturalOrder;
    use crate::schema::row::RowSchema;

    fn filled() -> RowSet {
        let schema = Arc::new(RowSchema::key_only(2, Arc::new(NaturalOrder)).unwrap());
        let mut set = RowSet::new(schema);
        for key in [b"dd", b"bb", b"ff", b"aa", b"cc"] {
            set.put(key).unwrap();
        }
        set
    }

    fn collect(iter: KeyIter<'_>) -> Vec<Vec<u8>> {
        iter.map(<[u8]>::to_vec).collect()
    }

    #[test]
    fn both_directions_cover_everything() {
        let mut set = filled();
        let up = collect(set.keys(true, None));
        assert_eq!(up, vec![b"aa".to_vec(), b"bb".to_vec(), b"cc".to_vec(), b"dd".to_vec(), b"ff".to_vec()]);
        let mut down = collect(set.keys(false, None));
        down.reverse();
        assert_eq!(down, up);
    }

    #[test]
    fn start_key_between_records() {
        let mut set = filled();
        let up: Vec<_> = collect(set.keys(true, Some(&b"ce"[..])));
        assert_eq!(up, vec![b"dd".to_vec(), b"ff".to_vec()]);
        let down: Vec<_> = collect(set.keys(false, Some(&b"ce"[..])));
        assert_eq!(down, vec![b"cc".to_vec(), b"bb".to_vec(), b"aa".to_vec()]);
        let down_exact: Vec<_> = collect(set.keys(false, Some(&b"dd"[..])));
        assert_eq!(down_exact.first().map(Vec::as_slice), Some(&b"dd"[..]));
    }

    #[test]
    fn restart_and_clone_from_key() {
        let mut set = filled();
        let mut rows = set.rows(true, None);
        assert_eq!(rows.next().unwrap().key(), b"aa");
        let sibling = rows.resume_at(b"ee");
        assert_eq!(sibling.len(), 1);
        assert_eq!(rows.next().unwrap().key(), b"bb");
        rows.restart_at(b"dd");
        assert_eq!(rows.next().unwrap().key(), b"dd");
        assert_eq!(rows.next_back().unwrap().key(), b"ff");
        assert!(rows.next().is_none());
    }

    #[test]
    fn descending_rows_iterator() {
        let mut set = filled();
        let rows = set.rows(false, Some(&b"zz"[..]));
        assert!(!rows.is_ascending());
        let keys: Vec<Vec<u8>> = rows.map(|e| e.key().to_vec()).collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(keys[0], b"ff");
    }
}
