//! Read-side aggregation over persisted usage data
//!
//! Queries go straight to storage and never look at the pending buffer;
//! call `StatsRecorder::flush` first for up-to-date numbers.

use chrono::Utc;

use super::StatsRecorder;
use crate::error::Result;
use crate::types::StatsPeriod;

impl StatsRecorder {
    /// Number of events recorded within `period` ("hour", "day", "week" or "month")
    ///
    /// Unknown periods fail with `RecorderError::InvalidPeriod` without
    /// touching storage.
    pub fn get_stats(&self, period: &str) -> Result<u64> {
        let period: StatsPeriod = period.parse()?;
        self.count_for(period)
    }

    /// Number of events with a creation time inside the lookback window
    pub fn count_for(&self, period: StatsPeriod) -> Result<u64> {
        let since = Utc::now() - period.lookback();
        Ok(self.shared.store.count_events_since(since)?)
    }

    /// Number of distinct chats ever recorded
    ///
    /// Not windowed: "active" means the chat has used the service at least
    /// once, at any time.
    pub fn get_active_chats_count(&self) -> Result<u64> {
        Ok(self.shared.store.count_distinct_chats()?)
    }
}
