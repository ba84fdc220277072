use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Point-in-time view of one collection, for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub record_count: usize,
    pub sort_bound: usize,
    pub capacity: usize,
    pub record_width: usize,
    pub order_signature: String,

    // Memory metrics
    pub allocated_bytes: usize,
    pub used_bytes: usize,
    pub utilization_percent: f32,

    pub last_read: DateTime<Utc>,
    pub last_write: DateTime<Utc>,
}

impl CollectionStats {
    pub fn unsorted_tail(&self) -> usize {
        self.record_count - self.sort_bound
    }

    pub fn is_fully_sorted(&self) -> bool {
        self.sort_bound == self.record_count
    }
}
