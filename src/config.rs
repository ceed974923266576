//! Application configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::recorder::{RecorderConfig, MAX_FLUSH_INTERVAL};
use crate::session::DEFAULT_SELECTION_TTL;
use crate::types::SenderId;

pub const DEFAULT_DB_PATH: &str = "usage_stats.db";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the binary needs to start
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file (`USAGE_DB_PATH`)
    pub db_path: PathBuf,
    /// tracing filter directive (`LOG_LEVEL`)
    pub log_level: String,
    /// Only sender allowed to request the report (`STATS_ADMIN_ID`)
    pub stats_admin_id: Option<SenderId>,
    pub recorder: RecorderConfig,
    /// Lifetime of a pending level selection (`SELECTION_TTL_SECS`)
    pub selection_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            stats_admin_id: None,
            recorder: RecorderConfig::default(),
            selection_ttl: DEFAULT_SELECTION_TTL,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = get("USAGE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let log_level = get("LOG_LEVEL").unwrap_or(defaults.log_level);
        let stats_admin_id = parse_opt::<SenderId>("STATS_ADMIN_ID", get("STATS_ADMIN_ID"))?;

        let mut recorder = defaults.recorder;
        if let Some(secs) = parse_opt::<u64>("USAGE_FLUSH_INTERVAL_SECS", get("USAGE_FLUSH_INTERVAL_SECS"))? {
            let interval = Duration::from_secs(secs);
            if interval > MAX_FLUSH_INTERVAL {
                return Err(ConfigError::Invalid {
                    key: "USAGE_FLUSH_INTERVAL_SECS",
                    value: secs.to_string(),
                    reason: format!("must be at most {}", MAX_FLUSH_INTERVAL.as_secs()),
                });
            }
            recorder.flush_interval = interval;
        }
        if let Some(threshold) = parse_opt::<usize>("USAGE_FLUSH_THRESHOLD", get("USAGE_FLUSH_THRESHOLD"))? {
            recorder.flush_threshold = threshold;
        }
        if let Some(capacity) = parse_opt::<usize>("USAGE_CHANNEL_CAPACITY", get("USAGE_CHANNEL_CAPACITY"))? {
            recorder.channel_capacity = capacity;
        }
        if let Some(max_pending) = parse_opt::<usize>("USAGE_MAX_PENDING", get("USAGE_MAX_PENDING"))? {
            recorder.max_pending = max_pending;
        }

        let selection_ttl = parse_opt::<u64>("SELECTION_TTL_SECS", get("SELECTION_TTL_SECS"))?
            .map(Duration::from_secs)
            .unwrap_or(defaults.selection_ttl);

        Ok(Self {
            db_path,
            log_level,
            stats_admin_id,
            recorder,
            selection_ttl,
        })
    }
}

fn parse_opt<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                value: v.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
