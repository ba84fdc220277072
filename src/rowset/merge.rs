use std::cmp::Ordering;
use crate::core::error::{Error, ErrorKind, Result};
use crate::rowset::row_set::RowSet;

impl RowSet {
    /// Sorted, duplicate-free union of two sets.
    ///
    /// Both inputs are sorted in place first. A two-cursor scan then emits
    /// the smaller key each step, one copy when both sides hold the same
    /// key, preferring the record from `a`. Output is appended in order, so
    /// it comes out fully sorted without another sort.
    pub fn merge(a: &mut RowSet, b: &mut RowSet) -> Result<RowSet> {
        if !a.schema().is_compatible(b.schema()) {
            return Err(Error::new(
                ErrorKind::OrderMismatch,
                "cannot merge row sets with different layouts or orderings".to_string(),
            ));
        }
        a.sort();
        b.sort();

        let schema = a.schema().clone();
        let mut out = RowSet::with_env(schema.clone(), a.len() + b.len(), a.env().clone())?;
        let (mut i, mut j) = (0, 0);

        while i < a.len() && j < b.len() {
            match schema.compare_records(a.record(i), b.record(j)) {
                Ordering::Equal => {
                    emit(&mut out, a.record(i))?;
                    i += 1;
                    j += 1;
                }
                Ordering::Less => {
                    emit(&mut out, a.record(i))?;
                    i += 1;
                }
                Ordering::Greater => {
                    emit(&mut out, b.record(j))?;
                    j += 1;
                }
            }
        }
        while i < a.len() {
            emit(&mut out, a.record(i))?;
            i += 1;
        }
        while j < b.len() {
            emit(&mut out, b.record(j))?;
            j += 1;
        }

        debug_assert_eq!(out.sort_bound(), out.len());
        Ok(out)
    }
}

/// Appends unless the key repeats the last emitted one, which happens when an
/// input was bulk-loaded with repeated keys
fn emit(out: &mut RowSet, record: &[u8]) -> Result<()> {
    if let Some(last) = out.len().checked_sub(1) {
        if out.schema().compare_records(out.record(last), record) == Ordering::Equal {
            return Ok(());
        }
    }
    out.add_unique(record)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::schema::order::{Base64Order, NaturalOrder};
    use crate::schema::row::RowSchema;

    fn schema() -> Arc<RowSchema> {
        Arc::new(RowSchema::parse("byte[] key-2, byte[] src-1", Arc::new(NaturalOrder)).unwrap())
    }

    fn set_of(records: &[&[u8]]) -> RowSet {
        let mut set = RowSet::new(schema());
        for r in records {
            set.add_unique(r).unwrap();
        }
        set
    }

    #[test]
    fn union_prefers_left_on_equal_keys() {
        let mut a = set_of(&[b"dda", b"aaa", b"cca"]);
        let mut b = set_of(&[b"ccb", b"bbb", b"eeb"]);
        let merged = RowSet::merge(&mut a, &mut b).unwrap();
        assert_eq!(merged.records_bytes(), b"aaabbbccaddaeeb");
        assert_eq!(merged.sort_bound(), merged.len());
        assert!(a.is_sorted());
        assert!(b.is_sorted());
    }

    #[test]
    fn drops_repeats_inside_one_input() {
        let mut a = set_of(&[b"aaa", b"aaa", b"bba"]);
        let mut b = set_of(&[]);
        let merged = RowSet::merge(&mut a, &mut b).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn incompatible_sets_are_rejected() {
        let mut a = set_of(&[b"aaa"]);
        let other = Arc::new(RowSchema::parse("byte[] key-2, byte[] src-1", Arc::new(Base64Order)).unwrap());
        let mut b = RowSet::new(other);
        let err = RowSet::merge(&mut a, &mut b).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OrderMismatch);
    }
}
