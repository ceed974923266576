//! Recorder counters
//!
//! Updated lock-free from producers and the flush engine; read as a
//! point-in-time snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RecorderMetrics {
    queued: AtomicU64,
    dropped_full: AtomicU64,
    dropped_overflow: AtomicU64,
    dropped_closed: AtomicU64,
    events_flushed: AtomicU64,
    flushes: AtomicU64,
    failed_flushes: AtomicU64,
}

/// Copy of the counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Events accepted into the intake channel
    pub queued: u64,
    /// Events dropped because the intake channel was full
    pub dropped_full: u64,
    /// Events dropped because the pending buffer hit its ceiling
    pub dropped_overflow: u64,
    /// Events rejected after shutdown
    pub dropped_closed: u64,
    /// Events persisted by successful flushes
    pub events_flushed: u64,
    /// Successful flushes
    pub flushes: u64,
    /// Flushes that rolled back or panicked
    pub failed_flushes: u64,
}

impl MetricsSnapshot {
    /// All drops, whatever the reason
    pub fn dropped(&self) -> u64 {
        self.dropped_full + self.dropped_overflow + self.dropped_closed
    }
}

impl RecorderMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            events_flushed: self.events_flushed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_full(&self) {
        self.dropped_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_overflow(&self) {
        self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_closed(&self) {
        self.dropped_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, events: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.events_flushed.fetch_add(events as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_flush(&self) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = RecorderMetrics::default();
        metrics.record_queued();
        metrics.record_queued();
        metrics.record_dropped_full();
        metrics.record_dropped_closed();
        metrics.record_flush(2);
        metrics.record_failed_flush();

        let snap = metrics.snapshot();
        assert_eq!(snap.queued, 2);
        assert_eq!(snap.dropped(), 2);
        assert_eq!(snap.events_flushed, 2);
        assert_eq!(snap.flushes, 1);
        assert_eq!(snap.failed_flushes, 1);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(MetricsSnapshot::default()).unwrap();
        assert!(json.get("droppedFull").is_some());
        assert!(json.get("eventsFlushed").is_some());
    }
}
