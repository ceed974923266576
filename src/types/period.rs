//! Lookback windows for usage statistics

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::RecorderError;

/// Time window a usage count is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Hour,
    Day,
    Week,
    /// Fixed 30 days, not a calendar month
    Month,
}

impl StatsPeriod {
    /// All periods, shortest first
    pub const ALL: [StatsPeriod; 4] = [
        StatsPeriod::Hour,
        StatsPeriod::Day,
        StatsPeriod::Week,
        StatsPeriod::Month,
    ];

    /// How far back from "now" the window reaches
    pub fn lookback(&self) -> Duration {
        match self {
            StatsPeriod::Hour => Duration::hours(1),
            StatsPeriod::Day => Duration::hours(24),
            StatsPeriod::Week => Duration::days(7),
            StatsPeriod::Month => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Hour => "hour",
            StatsPeriod::Day => "day",
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
        }
    }
}

impl std::fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatsPeriod {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(StatsPeriod::Hour),
            "day" => Ok(StatsPeriod::Day),
            "week" => Ok(StatsPeriod::Week),
            "month" => Ok(StatsPeriod::Month),
            other => Err(RecorderError::InvalidPeriod(other.to_string())),
        }
    }
}
