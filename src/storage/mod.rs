//! Storage boundary for usage statistics
//!
//! The recorder only talks to a transactional store through these traits:
//!
//! ```text
//! Write Path (one flush = one transaction):
//! ┌───────────┐    ┌──────────────────┐    ┌────────────────────┐    ┌────────┐
//! │ begin()   │───►│ upsert_chat()    │───►│ insert_events()    │───►│commit()│
//! │           │    │ per distinct id  │    │ chunks of ≤ 999    │    │        │
//! └───────────┘    └──────────────────┘    └────────────────────┘    └────────┘
//!
//! Read Path:
//! count_events_since(t)   count_distinct_chats()
//! ```
//!
//! `SqliteStore` is the bundled implementation.

mod schema;
mod sqlite;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{ChatId, NewEvent};

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersion { expected: i32, found: i32 },
}

/// A transactional store holding the chat and event tables
///
/// Implementations must be shareable across threads: the flush engine writes
/// from the consumer task while stats queries arrive from any caller.
pub trait Storage: Send + Sync {
    /// Open a transaction. Only one transaction is open at a time.
    fn begin(&self) -> StoreResult<Box<dyn StorageTx + '_>>;

    /// Number of event rows with `created_at >= since`
    fn count_events_since(&self, since: DateTime<Utc>) -> StoreResult<u64>;

    /// Number of distinct chat rows (all time)
    fn count_distinct_chats(&self) -> StoreResult<u64>;
}

/// An open transaction
///
/// Dropping a transaction that was neither committed nor rolled back rolls
/// it back.
pub trait StorageTx {
    /// Insert the chat if absent, otherwise set only its last-seen time
    fn upsert_chat(&mut self, chat_id: ChatId, seen_at: DateTime<Utc>) -> StoreResult<()>;

    /// Bulk insert event rows as one statement
    fn insert_events(&mut self, events: &[NewEvent]) -> StoreResult<()>;

    fn commit(self: Box<Self>) -> StoreResult<()>;

    fn rollback(self: Box<Self>) -> StoreResult<()>;
}
