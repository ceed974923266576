//! Usage statistics report
//!
//! Gathered on demand for one authorized identity: forces a flush so the
//! numbers include everything recorded so far, then reads every period.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::recorder::StatsRecorder;
use crate::types::{SenderId, StatsPeriod};

/// Counts for every period plus the all-time chat count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub last_hour: u64,
    pub last_day: u64,
    pub last_week: u64,
    pub last_month: u64,
    /// Distinct chats ever recorded
    pub total_chats: u64,
    pub generated_at: DateTime<Utc>,
}

impl StatsReport {
    /// Flush pending events, then query every period
    pub fn gather(recorder: &StatsRecorder) -> Result<Self> {
        let outcome = recorder.flush();
        if outcome.is_failed() {
            tracing::warn!(?outcome, "report gathered without pending events");
        }

        Ok(Self {
            last_hour: recorder.count_for(StatsPeriod::Hour)?,
            last_day: recorder.count_for(StatsPeriod::Day)?,
            last_week: recorder.count_for(StatsPeriod::Week)?,
            last_month: recorder.count_for(StatsPeriod::Month)?,
            total_chats: recorder.get_active_chats_count()?,
            generated_at: Utc::now(),
        })
    }

    pub fn count(&self, period: StatsPeriod) -> u64 {
        match period {
            StatsPeriod::Hour => self.last_hour,
            StatsPeriod::Day => self.last_day,
            StatsPeriod::Week => self.last_week,
            StatsPeriod::Month => self.last_month,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for StatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Usage statistics:")?;
        for period in StatsPeriod::ALL {
            let label = format!("last {}:", period);
            writeln!(f, "  {:<12}{}", label, self.count(period))?;
        }
        writeln!(f)?;
        write!(f, "Users (all time): {}", self.total_chats)
    }
}

/// Who may request the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportAccess {
    admin: Option<SenderId>,
}

impl ReportAccess {
    pub fn new(admin: Option<SenderId>) -> Self {
        Self { admin }
    }

    /// Only the configured admin; nobody when unset
    pub fn allows(&self, sender: SenderId) -> bool {
        self.admin == Some(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatsReport {
        StatsReport {
            last_hour: 1,
            last_day: 5,
            last_week: 12,
            last_month: 40,
            total_chats: 9,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_lists_every_period() {
        let text = sample().to_string();

        assert_eq!(
            text,
            "Usage statistics:\n  last hour:  1\n  last day:   5\n  last week:  12\n  last month: 40\n\nUsers (all time): 9"
        );
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["lastDay"], 5);
        assert_eq!(json["totalChats"], 9);
    }

    #[test]
    fn test_access_only_admin() {
        let access = ReportAccess::new(Some(1001));
        assert!(access.allows(1001));
        assert!(!access.allows(42));
    }

    #[test]
    fn test_access_denied_when_unset() {
        assert!(!ReportAccess::default().allows(0));
    }
}
