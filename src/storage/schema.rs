//! SQLite DDL and database initialization
//!
//! ```text
//! chats                         events
//! ┌──────────────────┐          ┌──────────────────────┐
//! │ id (PK)          │◄ ─ ─ ─ ─ │ chat_id (indexed)    │
//! │ created_at (ms)  │          │ id (PK, autoinc)     │
//! │ updated_at (ms)  │          │ created_at (ms)      │
//! └──────────────────┘          └──────────────────────┘
//! ```
//!
//! `events.chat_id` has no foreign key constraint. Every flush upserts the
//! chat rows before inserting their events, in the same transaction.

use rusqlite::Connection;

use super::{StoreError, StoreResult};

/// Stored in `PRAGMA user_version`. 0 means a fresh database.
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_CHATS: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    id          INTEGER PRIMARY KEY,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
)
"#;

const CREATE_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id     INTEGER NOT NULL,
    created_at  INTEGER NOT NULL
)
"#;

const CREATE_EVENTS_CHAT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_chat_id ON events(chat_id)";

const CREATE_EVENTS_CREATED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at)";

/// Connection-level pragmas for the writer connection
pub(crate) fn configure(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL")?;
    conn.execute_batch("PRAGMA synchronous = NORMAL")?;
    Ok(())
}

/// Create tables on a fresh database, verify the version otherwise
pub(crate) fn initialize(conn: &Connection) -> StoreResult<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    match version {
        0 => {
            conn.execute_batch("BEGIN")?;
            let created = (|| -> StoreResult<()> {
                conn.execute(CREATE_CHATS, [])?;
                conn.execute(CREATE_EVENTS, [])?;
                conn.execute(CREATE_EVENTS_CHAT_INDEX, [])?;
                conn.execute(CREATE_EVENTS_CREATED_INDEX, [])?;
                conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
                Ok(())
            })();
            match created {
                Ok(()) => conn.execute_batch("COMMIT")?,
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(e);
                }
            }
            tracing::info!(version = SCHEMA_VERSION, "created usage stats schema");
            Ok(())
        }
        SCHEMA_VERSION => Ok(()),
        found => Err(StoreError::SchemaVersion {
            expected: SCHEMA_VERSION,
            found,
        }),
    }
}
