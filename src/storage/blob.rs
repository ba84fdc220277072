use std::sync::Arc;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;
use crate::collection::row_collection::RowCollection;
use crate::core::config::CollectionEnv;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::time;
use crate::schema::order::UNORDERED_SIGNATURE;
use crate::schema::row::RowSchema;
use crate::storage::arena::RecordArena;

/// Serialized collection layout (all integers big-endian):
///
/// | offset | width | field |
/// |--------|-------|-------|
/// | 0  | 4 | record count |
/// | 4  | 2 | last-read day (since 2000-01-01) |
/// | 6  | 2 | last-write day |
/// | 8  | 2 | ordering signature, `__` when unordered |
/// | 10 | 4 | sort bound |
/// | 14 | count * width | records |
pub const HEADER_SIZE: usize = 14;

/// Decoded blob header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobHeader {
    pub record_count: u32,
    pub last_read_day: u16,
    pub last_write_day: u16,
    pub signature: [u8; 2],
    pub sort_bound: u32,
}

impl BlobHeader {
    pub fn read(blob: &[u8]) -> Result<Self> {
        if blob.len() < HEADER_SIZE {
            return Err(Error::new(
                ErrorKind::MalformedRecord,
                format!("blob of {} bytes is shorter than the {} byte header", blob.len(), HEADER_SIZE),
            ));
        }
        let mut buf = &blob[..HEADER_SIZE];
        let record_count = buf.get_u32();
        let last_read_day = buf.get_u16();
        let last_write_day = buf.get_u16();
        let signature = [buf.get_u8(), buf.get_u8()];
        let sort_bound = buf.get_u32();
        Ok(BlobHeader {
            record_count,
            last_read_day,
            last_write_day,
            signature,
            sort_bound,
        })
    }

    fn write(&self, out: &mut BytesMut) {
        out.put_u32(self.record_count);
        out.put_u16(self.last_read_day);
        out.put_u16(self.last_write_day);
        out.put_slice(&self.signature);
        out.put_u32(self.sort_bound);
    }
}

impl RowCollection {
    /// Serializes header and occupied records
    pub fn export(&self) -> Result<Bytes> {
        let too_large = |what: &str| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("{} of {} exceeds the 32-bit blob field", what, self.len()),
            )
        };
        let header = BlobHeader {
            record_count: u32::try_from(self.len()).map_err(|_| too_large("record count"))?,
            last_read_day: time::days_since_epoch(self.last_read()),
            last_write_day: time::days_since_epoch(self.last_write()),
            signature: self.schema().signature(),
            sort_bound: u32::try_from(self.sort_bound()).map_err(|_| too_large("sort bound"))?,
        };

        let records = self.records_bytes();
        let mut out = BytesMut::with_capacity(HEADER_SIZE + records.len());
        header.write(&mut out);
        out.put_slice(records);
        Ok(out.freeze())
    }

    /// Rebuilds a collection from `export` output.
    ///
    /// Counts that point past the supplied bytes are clamped with a warning
    /// instead of failing, so partially damaged blobs still load. A stored
    /// ordering that differs from the schema's is an error; a blob written
    /// without an ordering loads with an empty sorted prefix.
    pub fn import_from(schema: Arc<RowSchema>, blob: &[u8], env: CollectionEnv) -> Result<Self> {
        env.config.validate()?;
        let header = BlobHeader::read(blob)?;
        let width = schema.record_width();

        let expected = schema.signature();
        if header.signature != UNORDERED_SIGNATURE
            && expected != UNORDERED_SIGNATURE
            && header.signature != expected
        {
            return Err(Error::new(
                ErrorKind::OrderMismatch,
                format!(
                    "blob ordered by '{}', schema ordered by '{}'",
                    String::from_utf8_lossy(&header.signature),
                    String::from_utf8_lossy(&expected)
                ),
            ));
        }

        let payload = &blob[HEADER_SIZE..];
        let stored = payload.len() / width;
        let mut count = header.record_count as usize;
        if count > stored {
            warn!(declared = count, stored, "blob declares more records than it holds, clamping");
            count = stored;
        }

        let mut sort_bound = header.sort_bound as usize;
        if header.signature == UNORDERED_SIGNATURE {
            sort_bound = 0;
        } else if sort_bound > count {
            warn!(sort_bound, count, "blob sort bound exceeds record count, clamping");
            sort_bound = count;
        }

        let bytes_needed = (count * width) as u64;
        if bytes_needed > env.memory.available() {
            return Err(Error::new(
                ErrorKind::CapacityExhausted,
                format!("importing {} records needs {} bytes", count, bytes_needed),
            ));
        }
        let mut data = Vec::new();
        data.try_reserve_exact(count * width)?;
        data.extend_from_slice(&payload[..count * width]);
        let arena = RecordArena::from_bytes(width, data);

        Ok(RowCollection::from_parts(
            schema,
            env,
            arena,
            count,
            sort_bound,
            time::from_days(header.last_read_day),
            time::from_days(header.last_write_day),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::order::{Base64Order, NaturalOrder};

    fn schema() -> Arc<RowSchema> {
        Arc::new(RowSchema::key_only(3, Arc::new(NaturalOrder)).unwrap())
    }

    #[test]
    fn header_layout_is_big_endian() {
        let rows = RowCollection::from_records(schema(), [b"abc", b"abd", b"aaa"]).unwrap();
        let blob = rows.export().unwrap();
        assert_eq!(blob.len(), HEADER_SIZE + 9);
        assert_eq!(&blob[0..4], &[0u8, 0, 0, 3]);
        assert_eq!(&blob[8..10], b"nd");
        assert_eq!(&blob[10..14], &[0u8, 0, 0, 2]);
        assert_eq!(&blob[14..], b"abcabdaaa");
    }

    #[test]
    fn round_trip_keeps_bounds() {
        let rows = RowCollection::from_records(schema(), [b"abc", b"abd", b"aaa"]).unwrap();
        let blob = rows.export().unwrap();
        let back = RowCollection::import_from(schema(), &blob, CollectionEnv::default()).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.sort_bound(), 2);
        assert_eq!(back.records_bytes(), rows.records_bytes());
        assert_eq!(back.export().unwrap()[8..], blob[8..]);
    }

    #[test]
    fn clamps_overlong_counts() {
        let rows = RowCollection::from_records(schema(), [b"aaa", b"bbb"]).unwrap();
        let mut blob = rows.export().unwrap().to_vec();
        blob[0..4].copy_from_slice(&100u32.to_be_bytes());
        blob[10..14].copy_from_slice(&90u32.to_be_bytes());
        blob.push(b'x'); // partial trailing record
        let back = RowCollection::import_from(schema(), &blob, CollectionEnv::default()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.sort_bound(), 2);
    }

    #[test]
    fn rejects_foreign_ordering() {
        let rows = RowCollection::from_records(schema(), [b"aaa"]).unwrap();
        let blob = rows.export().unwrap();
        let base64 = Arc::new(RowSchema::key_only(3, Arc::new(Base64Order)).unwrap());
        let err = RowCollection::import_from(base64, &blob, CollectionEnv::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OrderMismatch);
    }

    #[test]
    fn unordered_blob_loads_unsorted() {
        let rows = RowCollection::from_records(schema(), [b"aaa", b"bbb"]).unwrap();
        let mut blob = rows.export().unwrap().to_vec();
        blob[8..10].copy_from_slice(&UNORDERED_SIGNATURE);
        let back = RowCollection::import_from(schema(), &blob, CollectionEnv::default()).unwrap();
        assert_eq!(back.sort_bound(), 0);
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn short_blob_is_malformed() {
        let err = RowCollection::import_from(schema(), &[0u8; 5], CollectionEnv::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRecord);
    }
}
