//! Line commands understood by the server
//!
//! ```text
//! event  <chat_id>
//! photo  <sender_id> <token>
//! choose <chat_id> <sender_id> <callback_data>
//! stats  <sender_id>
//! flush
//! metrics
//! ```

use std::str::FromStr;

use thiserror::Error;

use crate::types::{ChatId, SenderId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record one usage event for a chat
    Event { chat_id: ChatId },
    /// A sender uploaded an item and will choose a level next
    Photo { sender_id: SenderId, token: String },
    /// A level-choice callback arrived
    Choose {
        chat_id: ChatId,
        sender_id: SenderId,
        data: String,
    },
    /// Request the usage report
    Stats { sender_id: SenderId },
    Flush,
    Metrics,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid {field}: {value}")]
    InvalidId { field: &'static str, value: String },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = parts.collect();

        match (name, args.as_slice()) {
            ("event", [chat_id]) => Ok(Command::Event {
                chat_id: parse_id("chat_id", chat_id)?,
            }),
            ("event", _) => Err(CommandError::Usage("event <chat_id>")),

            ("photo", [sender_id, token]) => Ok(Command::Photo {
                sender_id: parse_id("sender_id", sender_id)?,
                token: token.to_string(),
            }),
            ("photo", _) => Err(CommandError::Usage("photo <sender_id> <token>")),

            ("choose", [chat_id, sender_id, data]) => Ok(Command::Choose {
                chat_id: parse_id("chat_id", chat_id)?,
                sender_id: parse_id("sender_id", sender_id)?,
                data: data.to_string(),
            }),
            ("choose", _) => Err(CommandError::Usage("choose <chat_id> <sender_id> <callback_data>")),

            ("stats", [sender_id]) => Ok(Command::Stats {
                sender_id: parse_id("sender_id", sender_id)?,
            }),
            ("stats", _) => Err(CommandError::Usage("stats <sender_id>")),

            ("flush", []) => Ok(Command::Flush),
            ("metrics", []) => Ok(Command::Metrics),
            ("flush", _) | ("metrics", _) => Err(CommandError::Usage("flush | metrics")),

            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_id(field: &'static str, value: &str) -> Result<i64, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidId {
        field,
        value: value.to_string(),
    })
}
