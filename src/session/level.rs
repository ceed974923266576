//! Level choice carried by a callback payload (`level_N`)

use crate::error::{RecorderError, Result};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 10;

const CALLBACK_PREFIX: &str = "level_";

/// Validated level in `MIN_LEVEL..=MAX_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SelectionLevel(u8);

impl SelectionLevel {
    pub fn new(level: u8) -> Result<Self> {
        if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            Ok(Self(level))
        } else {
            Err(RecorderError::InvalidLevel(level.to_string()))
        }
    }

    /// Parse callback data such as `"level_7"`; surrounding whitespace is ignored
    pub fn parse_callback(data: &str) -> Result<Self> {
        let trimmed = data.trim();
        let digits = trimmed.strip_prefix(CALLBACK_PREFIX).unwrap_or(trimmed);
        let level: u8 = digits
            .parse()
            .map_err(|_| RecorderError::InvalidLevel(data.to_string()))?;
        Self::new(level).map_err(|_| RecorderError::InvalidLevel(data.to_string()))
    }

    /// Callback payload for this level
    pub fn callback_data(&self) -> String {
        format!("{}{}", CALLBACK_PREFIX, self.0)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Every valid level, lowest first
    pub fn all() -> impl Iterator<Item = SelectionLevel> {
        (MIN_LEVEL..=MAX_LEVEL).map(SelectionLevel)
    }
}

impl std::fmt::Display for SelectionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
