//! Recorder tuning knobs

use std::time::Duration;

/// Intake channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
/// Buffer length that triggers an immediate flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1000;
/// Timer-triggered flush period
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Longest accepted flush period
pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Rows per bulk INSERT statement
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 999;
/// Ceiling on buffered events while the store keeps failing
pub const DEFAULT_MAX_PENDING: usize = 100_000;

/// Configuration for the StatsRecorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Capacity of the non-blocking intake queue
    pub channel_capacity: usize,
    /// Flush as soon as this many events are buffered
    pub flush_threshold: usize,
    /// Flush whatever is pending at this interval
    pub flush_interval: Duration,
    /// Maximum rows per bulk insert
    pub insert_chunk_size: usize,
    /// New events are dropped once this many are buffered
    pub max_pending: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            insert_chunk_size: DEFAULT_INSERT_CHUNK_SIZE,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

impl RecorderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_insert_chunk_size(mut self, chunk_size: usize) -> Self {
        self.insert_chunk_size = chunk_size;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Clamp values the runtime cannot work with: zero capacities and a
    /// flush period outside `1ms..=MAX_FLUSH_INTERVAL`
    pub(crate) fn normalized(mut self) -> Self {
        self.channel_capacity = self.channel_capacity.max(1);
        self.flush_threshold = self.flush_threshold.max(1);
        self.flush_interval = self
            .flush_interval
            .clamp(Duration::from_millis(1), MAX_FLUSH_INTERVAL);
        self.insert_chunk_size = self.insert_chunk_size.max(1);
        self.max_pending = self.max_pending.max(self.flush_threshold);
        self
    }
}
