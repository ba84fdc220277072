use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::column::{decode_cardinal, encode_cardinal, Column, ColumnEncoding};
use crate::schema::order::ByteOrder;

/// Immutable layout of one fixed-width record.
///
/// Built once per table and shared behind an `Arc` by every collection that
/// stores rows of this shape.
pub struct RowSchema {
    columns: Vec<Column>,
    offsets: Vec<usize>,
    record_width: usize,
    primary_key: usize,
    order: Arc<dyn ByteOrder>,
}

impl RowSchema {
    pub fn new(columns: Vec<Column>, primary_key: usize, order: Arc<dyn ByteOrder>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "a row needs at least one column".to_string(),
            ));
        }
        if primary_key >= columns.len() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("primary key column {} of {} columns", primary_key, columns.len()),
            ));
        }
        if let Some(col) = columns.iter().find(|c| c.width == 0) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("column '{}' has zero width", col.name),
            ));
        }

        let mut offsets = Vec::with_capacity(columns.len());
        let mut record_width = 0;
        for col in &columns {
            offsets.push(record_width);
            record_width += col.width;
        }

        Ok(RowSchema {
            columns,
            offsets,
            record_width,
            primary_key,
            order,
        })
    }

    /// Schema from a layout string; the first column is the primary key
    pub fn parse(layout: &str, order: Arc<dyn ByteOrder>) -> Result<Self> {
        Self::new(Column::parse_layout(layout)?, 0, order)
    }

    /// Single-column schema where the whole record is the key
    pub fn key_only(width: usize, order: Arc<dyn ByteOrder>) -> Result<Self> {
        Self::new(vec![Column::bytes("key", width)], 0, order)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_offset(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    pub fn column_by_name(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn record_width(&self) -> usize {
        self.record_width
    }

    pub fn primary_key_offset(&self) -> usize {
        self.offsets[self.primary_key]
    }

    pub fn primary_key_width(&self) -> usize {
        self.columns[self.primary_key].width
    }

    pub fn order(&self) -> &Arc<dyn ByteOrder> {
        &self.order
    }

    pub fn signature(&self) -> [u8; 2] {
        self.order.signature()
    }

    /// Primary-key sub-range of a record
    #[inline]
    pub fn key_of<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        let start = self.primary_key_offset();
        &record[start..start + self.primary_key_width()]
    }

    /// Orders two full records by their primary keys
    #[inline]
    pub fn compare_records(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.order.compare(self.key_of(a), self.key_of(b))
    }

    pub fn check_record(&self, record: &[u8]) -> Result<()> {
        if record.len() != self.record_width {
            return Err(Error::malformed_record(record.len(), self.record_width));
        }
        Ok(())
    }

    pub fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.primary_key_width() {
            return Err(Error::new(
                ErrorKind::MalformedRecord,
                format!("key has {} bytes, schema requires {}", key.len(), self.primary_key_width()),
            ));
        }
        Ok(())
    }

    /// Same width, same key range, same ordering
    pub fn is_compatible(&self, other: &RowSchema) -> bool {
        self.record_width == other.record_width
            && self.primary_key_offset() == other.primary_key_offset()
            && self.primary_key_width() == other.primary_key_width()
            && self.signature() == other.signature()
    }
}

impl fmt::Debug for RowSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSchema")
            .field("columns", &self.columns)
            .field("record_width", &self.record_width)
            .field("primary_key", &self.primary_key)
            .field("order", &self.order)
            .finish()
    }
}

/// Owned copy of one record, read out of a collection
#[derive(Clone)]
pub struct Entry {
    schema: Arc<RowSchema>,
    bytes: Vec<u8>,
}

impl Entry {
    pub fn new(schema: Arc<RowSchema>, bytes: Vec<u8>) -> Result<Self> {
        schema.check_record(&bytes)?;
        Ok(Entry { schema, bytes })
    }

    /// Zero-filled record
    pub fn empty(schema: Arc<RowSchema>) -> Self {
        let bytes = vec![0u8; schema.record_width()];
        Entry { schema, bytes }
    }

    pub(crate) fn from_trusted(schema: Arc<RowSchema>, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), schema.record_width());
        Entry { schema, bytes }
    }

    pub fn key(&self) -> &[u8] {
        self.schema.key_of(&self.bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    pub fn column(&self, index: usize) -> Option<&[u8]> {
        let offset = self.schema.column_offset(index)?;
        let width = self.schema.columns()[index].width;
        Some(&self.bytes[offset..offset + width])
    }

    pub fn cardinal(&self, index: usize) -> Option<u64> {
        match self.schema.columns().get(index)?.encoding {
            ColumnEncoding::Cardinal => self.column(index).map(decode_cardinal),
            ColumnEncoding::Bytes => None,
        }
    }

    pub fn set_column(&mut self, index: usize, value: &[u8]) -> Result<()> {
        let offset = self
            .schema
            .column_offset(index)
            .ok_or_else(|| Error::index_out_of_range(index, self.schema.columns().len()))?;
        let width = self.schema.columns()[index].width;
        if value.len() > width {
            return Err(Error::new(
                ErrorKind::MalformedRecord,
                format!("value of {} bytes exceeds column width {}", value.len(), width),
            ));
        }
        let slot = &mut self.bytes[offset..offset + width];
        slot[..value.len()].copy_from_slice(value);
        slot[value.len()..].fill(0);
        Ok(())
    }

    pub fn set_cardinal(&mut self, index: usize, value: u64) -> Result<()> {
        let offset = self
            .schema
            .column_offset(index)
            .ok_or_else(|| Error::index_out_of_range(index, self.schema.columns().len()))?;
        let width = self.schema.columns()[index].width;
        encode_cardinal(&mut self.bytes[offset..offset + width], value);
        Ok(())
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Entry {}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &String::from_utf8_lossy(self.key()))
            .field("bytes", &self.bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::order::NaturalOrder;

    fn url_schema() -> Arc<RowSchema> {
        Arc::new(
            RowSchema::parse("byte[] urlhash-12, Cardinal hits-4 {b256}, byte[] flags-2", Arc::new(NaturalOrder))
                .unwrap(),
        )
    }

    #[test]
    fn offsets_and_width() {
        let schema = url_schema();
        assert_eq!(schema.record_width(), 18);
        assert_eq!(schema.column_offset(1), Some(12));
        assert_eq!(schema.column_offset(2), Some(16));
        assert_eq!(schema.column_by_name("flags"), Some(2));
        assert_eq!(schema.primary_key_width(), 12);
    }

    #[test]
    fn non_leading_primary_key() {
        let schema = RowSchema::new(
            vec![Column::cardinal("n", 2), Column::bytes("key", 3)],
            1,
            Arc::new(NaturalOrder),
        )
        .unwrap();
        assert_eq!(schema.key_of(b"\x00\x01abc"), b"abc");
        assert_eq!(schema.compare_records(b"\x09\x09abc", b"\x00\x00abd"), Ordering::Less);
    }

    #[test]
    fn entry_column_access() {
        let schema = url_schema();
        let mut entry = Entry::empty(schema.clone());
        entry.set_column(0, b"AAAAAAAAAAAA").unwrap();
        entry.set_cardinal(1, 4711).unwrap();
        assert_eq!(entry.key(), b"AAAAAAAAAAAA");
        assert_eq!(entry.cardinal(1), Some(4711));
        assert_eq!(entry.cardinal(0), None);
        assert!(entry.set_column(2, b"xyz").is_err());
        assert_eq!(entry.set_cardinal(9, 1).unwrap_err().kind, ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn rejects_wrong_record_width() {
        let schema = url_schema();
        let err = Entry::new(schema, vec![0; 5]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRecord);
    }
}
