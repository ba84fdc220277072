use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use sysinfo::System;

/// Memory-pressure signal consulted before a collection grows or trims.
///
/// Implementations must be cheap to call: `available` runs on every growth
/// event. The allocation hooks let trackers account for collection buffers;
/// they default to no-ops.
pub trait MemoryOracle: Send + Sync {
    /// Bytes that may still be allocated without risking an out-of-memory condition
    fn available(&self) -> u64;

    /// Whether callers should give back slack memory
    fn under_pressure(&self) -> bool;

    fn record_alloc(&self, _bytes: usize) {}

    fn record_free(&self, _bytes: usize) {}
}

/// Never denies growth, never reports pressure
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl MemoryOracle for Unbounded {
    fn available(&self) -> u64 {
        u64::MAX
    }

    fn under_pressure(&self) -> bool {
        false
    }
}

/// Memory usage tracker with a hard byte limit
pub struct MemoryTracker {
    pub usage: AtomicUsize,
    pub limit: usize,
    pub gc_threshold: f32,          // Pressure trigger (0.8 = 80%)
}

impl MemoryTracker {
    pub fn new(limit: usize) -> Self {
        MemoryTracker {
            usage: AtomicUsize::new(0),
            limit,
            gc_threshold: 0.8,
        }
    }

    pub fn with_threshold(limit: usize, gc_threshold: f32) -> Self {
        MemoryTracker {
            usage: AtomicUsize::new(0),
            limit,
            gc_threshold,
        }
    }

    pub fn current_usage(&self) -> usize {
        self.usage.load(Ordering::Acquire)
    }

    /// Fraction of the limit in use
    pub fn memory_pressure(&self) -> f32 {
        if self.limit == 0 {
            return 1.0;
        }
        self.current_usage() as f32 / self.limit as f32
    }
}

impl MemoryOracle for MemoryTracker {
    fn available(&self) -> u64 {
        self.limit.saturating_sub(self.current_usage()) as u64
    }

    fn under_pressure(&self) -> bool {
        self.memory_pressure() > self.gc_threshold
    }

    fn record_alloc(&self, bytes: usize) {
        self.usage.fetch_add(bytes, Ordering::SeqCst);
    }

    fn record_free(&self, bytes: usize) {
        let _ = self.usage.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
            Some(used.saturating_sub(bytes))
        });
    }
}

/// Operating-system view of free memory
pub struct SystemMemory {
    system: Mutex<System>,
    pub pressure_floor: u64,        // Report pressure below this many free bytes
}

impl SystemMemory {
    pub fn new() -> Self {
        Self::with_floor(64 * 1024 * 1024)
    }

    pub fn with_floor(pressure_floor: u64) -> Self {
        SystemMemory {
            system: Mutex::new(System::new()),
            pressure_floor,
        }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOracle for SystemMemory {
    fn available(&self) -> u64 {
        let mut sys = self.system.lock();
        sys.refresh_memory();
        sys.available_memory()
    }

    fn under_pressure(&self) -> bool {
        self.available() < self.pressure_floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_reports_headroom_and_pressure() {
        let tracker = MemoryTracker::new(1000);
        assert_eq!(tracker.available(), 1000);
        assert!(!tracker.under_pressure());

        tracker.record_alloc(850);
        assert_eq!(tracker.available(), 150);
        assert!(tracker.under_pressure());

        tracker.record_free(2000);
        assert_eq!(tracker.current_usage(), 0);
    }

    #[test]
    fn unbounded_never_denies() {
        assert_eq!(Unbounded.available(), u64::MAX);
        assert!(!Unbounded.under_pressure());
    }
}
