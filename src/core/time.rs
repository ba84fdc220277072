use chrono::{DateTime, Duration, Utc};

const EPOCH_UNIX_SECS: i64 = 946_684_800;

/// Day stamps in exported blobs count whole days since 2000-01-01 UTC.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(EPOCH_UNIX_SECS)
}

/// Saturates into the 16-bit field: dates before the epoch become 0.
pub fn days_since_epoch(at: DateTime<Utc>) -> u16 {
    let days = (at - epoch()).num_days();
    days.clamp(0, u16::MAX as i64) as u16
}

pub fn from_days(days: u16) -> DateTime<Utc> {
    epoch() + Duration::days(days as i64)
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(epoch)
}
