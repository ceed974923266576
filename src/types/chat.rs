//! Chat and event record types
//!
//! A chat is the dimension row (one per distinct key), an event is the
//! append-only fact row (one per recorded occurrence).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the chat/session a usage event originates from
pub type ChatId = i64;

/// Identifier of the user who sent a message (used by the front-end)
pub type SenderId = i64;

/// Dimension record: first and last time a chat was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: ChatId,
    /// First seen, set once on insert
    pub created_at: DateTime<Utc>,
    /// Last seen, bumped by every flush containing this chat
    pub updated_at: DateTime<Utc>,
}

/// Fact record awaiting insertion (the surrogate id is assigned by the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub chat_id: ChatId,
    pub created_at: DateTime<Utc>,
}

impl NewEvent {
    pub fn new(chat_id: ChatId, created_at: DateTime<Utc>) -> Self {
        Self { chat_id, created_at }
    }
}
