//! SQLite-backed `Storage`
//!
//! One writer connection (used only by flushes) and one read-only
//! connection for stats queries, so a long flush never queues readers
//! behind the writer's mutex. WAL mode lets both proceed concurrently.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};

use super::{schema, Storage, StorageTx, StoreError, StoreResult};
use crate::types::{ChatId, ChatRecord, NewEvent};
use crate::utils::time::{from_millis, to_millis};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const UPSERT_CHAT: &str = r#"
INSERT INTO chats (id, created_at, updated_at) VALUES (?1, ?2, ?2)
ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at
"#;

/// Usage stats database on disk
pub struct SqliteStore {
    path: PathBuf,
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer = Connection::open(&path)?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        schema::configure(&writer)?;
        schema::initialize(&writer)?;

        let reader = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        reader.busy_timeout(BUSY_TIMEOUT)?;

        tracing::debug!(path = %path.display(), "opened usage stats database");

        Ok(Self {
            path,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a single chat row
    pub fn chat(&self, chat_id: ChatId) -> StoreResult<Option<ChatRecord>> {
        let conn = self.reader.lock();
        let record = conn
            .query_row(
                "SELECT id, created_at, updated_at FROM chats WHERE id = ?1",
                [chat_id],
                |row| {
                    Ok(ChatRecord {
                        id: row.get(0)?,
                        created_at: from_millis(row.get(1)?),
                        updated_at: from_millis(row.get(2)?),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Number of event rows recorded for one chat
    pub fn count_events_for_chat(&self, chat_id: ChatId) -> StoreResult<u64> {
        let conn = self.reader.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE chat_id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Total number of event rows
    pub fn count_events(&self) -> StoreResult<u64> {
        let conn = self.reader.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Storage for SqliteStore {
    fn begin(&self) -> StoreResult<Box<dyn StorageTx + '_>> {
        let conn = self.writer.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }

    fn count_events_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        let conn = self.reader.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE created_at >= ?1",
            [to_millis(since)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_distinct_chats(&self) -> StoreResult<u64> {
        let conn = self.reader.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT id) FROM chats", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Transaction on the writer connection, holding its lock until finished
struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SqliteTx<'_> {
    fn finish(&mut self, sql: &str) -> StoreResult<()> {
        if self.finished {
            return Err(StoreError::Transaction("transaction already finished".to_string()));
        }
        self.conn.execute_batch(sql)?;
        self.finished = true;
        Ok(())
    }
}

impl StorageTx for SqliteTx<'_> {
    fn upsert_chat(&mut self, chat_id: ChatId, seen_at: DateTime<Utc>) -> StoreResult<()> {
        let mut stmt = self.conn.prepare_cached(UPSERT_CHAT)?;
        stmt.execute(params![chat_id, to_millis(seen_at)])?;
        Ok(())
    }

    fn insert_events(&mut self, events: &[NewEvent]) -> StoreResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["(?, ?)"; events.len()].join(", ");
        let sql = format!("INSERT INTO events (chat_id, created_at) VALUES {}", placeholders);

        let values = events
            .iter()
            .flat_map(|e| [e.chat_id, to_millis(e.created_at)]);

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let inserted = stmt.execute(params_from_iter(values))?;
        if inserted != events.len() {
            return Err(StoreError::Transaction(format!(
                "expected to insert {} events, inserted {}",
                events.len(),
                inserted
            )));
        }
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.finish("COMMIT")
    }

    fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}
