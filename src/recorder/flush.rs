//! The transactional flush
//!
//! ```text
//! buffer ──► count per chat ──► BEGIN ──► upsert chats ──► insert events ──► COMMIT
//!                                              │           (≤ chunk rows each)
//!                                              └── any error or panic ──► ROLLBACK, keep buffer
//! ```
//!
//! Always called with the buffer lock held, so producers' events queue in
//! the intake channel until the flush finishes.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};

use super::buffer::PendingBuffer;
use super::metrics::RecorderMetrics;
use crate::storage::{Storage, StorageTx, StoreResult};
use crate::types::{ChatId, NewEvent};

/// What caused a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Buffer reached the size threshold
    Size,
    /// Periodic timer
    Timer,
    /// Caller asked for fresh data
    Manual,
    /// Final flush of the event loop
    Shutdown,
}

impl std::fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushTrigger::Size => write!(f, "size"),
            FlushTrigger::Timer => write!(f, "timer"),
            FlushTrigger::Manual => write!(f, "manual"),
            FlushTrigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Result of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered
    Empty,
    /// Committed; the buffer is now empty
    Flushed { events: usize, chats: usize },
    /// Rolled back (or panicked); the buffer is unchanged
    Failed { pending: usize },
}

impl FlushOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FlushOutcome::Failed { .. })
    }
}

/// Persist the whole buffer in one transaction and clear it on success
pub(crate) fn flush_pending(
    store: &dyn Storage,
    buffer: &mut PendingBuffer,
    chunk_size: usize,
    metrics: &RecorderMetrics,
    trigger: FlushTrigger,
) -> FlushOutcome {
    if buffer.is_empty() {
        return FlushOutcome::Empty;
    }

    let now = Utc::now();
    let written = panic::catch_unwind(AssertUnwindSafe(|| {
        write_batch(store, buffer.keys(), now, chunk_size)
    }));

    match written {
        Ok(Ok(chats)) => {
            let events = buffer.len();
            buffer.clear();
            metrics.record_flush(events);
            tracing::debug!(%trigger, events, chats, "flushed usage events");
            FlushOutcome::Flushed { events, chats }
        }
        Ok(Err(e)) => {
            buffer.defer_size_trigger();
            metrics.record_failed_flush();
            tracing::error!(%trigger, pending = buffer.len(), error = %e, "failed to flush usage events");
            FlushOutcome::Failed {
                pending: buffer.len(),
            }
        }
        Err(payload) => {
            buffer.defer_size_trigger();
            metrics.record_failed_flush();
            tracing::error!(
                %trigger,
                pending = buffer.len(),
                panic = %panic_message(payload.as_ref()),
                "panic while flushing usage events"
            );
            FlushOutcome::Failed {
                pending: buffer.len(),
            }
        }
    }
}

/// One transaction: upsert every distinct chat, then insert one event per key.
/// Returns the number of distinct chats.
fn write_batch(
    store: &dyn Storage,
    keys: &[ChatId],
    now: DateTime<Utc>,
    chunk_size: usize,
) -> StoreResult<usize> {
    let mut chat_counts: BTreeMap<ChatId, usize> = BTreeMap::new();
    for &chat_id in keys {
        *chat_counts.entry(chat_id).or_insert(0) += 1;
    }

    let mut tx = store.begin()?;
    match write_rows(tx.as_mut(), &chat_counts, keys, now, chunk_size) {
        Ok(()) => {
            tx.commit()?;
            Ok(chat_counts.len())
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

fn write_rows(
    tx: &mut (dyn StorageTx + '_),
    chat_counts: &BTreeMap<ChatId, usize>,
    keys: &[ChatId],
    now: DateTime<Utc>,
    chunk_size: usize,
) -> StoreResult<()> {
    for &chat_id in chat_counts.keys() {
        tx.upsert_chat(chat_id, now)?;
    }

    let events: Vec<NewEvent> = keys.iter().map(|&id| NewEvent::new(id, now)).collect();
    debug_assert_eq!(events.len(), chat_counts.values().sum::<usize>());

    for chunk in events.chunks(chunk_size) {
        tx.insert_events(chunk)?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::testing::{FaultyStore, Fault};

    fn buffer_with(keys: &[ChatId]) -> PendingBuffer {
        let mut buffer = PendingBuffer::new(1000);
        for &k in keys {
            buffer.push(k, usize::MAX);
        }
        buffer
    }

    #[test]
    fn test_empty_buffer_is_noop() {
        let (store, _dir) = FaultyStore::create();
        let metrics = RecorderMetrics::default();
        let mut buffer = PendingBuffer::new(10);

        let outcome = flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Manual);

        assert_eq!(outcome, FlushOutcome::Empty);
        assert_eq!(store.begin_calls(), 0);
    }

    #[test]
    fn test_flush_writes_chats_and_events() {
        let (store, _dir) = FaultyStore::create();
        let metrics = RecorderMetrics::default();
        let mut buffer = buffer_with(&[42, 7, 42, 42, 7]);

        let outcome = flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Manual);

        assert_eq!(outcome, FlushOutcome::Flushed { events: 5, chats: 2 });
        assert!(buffer.is_empty());
        assert_eq!(store.inner().count_events_for_chat(42).unwrap(), 3);
        assert_eq!(store.inner().count_events_for_chat(7).unwrap(), 2);
        assert_eq!(store.inner().count_distinct_chats().unwrap(), 2);
        assert_eq!(metrics.snapshot().events_flushed, 5);
    }

    #[test]
    fn test_events_are_chunked() {
        let (store, _dir) = FaultyStore::create();
        let metrics = RecorderMetrics::default();
        let keys: Vec<ChatId> = (0..2500).map(|i| i % 3).collect();
        let mut buffer = buffer_with(&keys);

        let outcome = flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Size);

        assert_eq!(outcome, FlushOutcome::Flushed { events: 2500, chats: 3 });
        assert_eq!(store.insert_sizes(), vec![999, 999, 502]);
        assert_eq!(store.inner().count_events().unwrap(), 2500);
    }

    #[test]
    fn test_chats_upserted_before_events() {
        let (store, _dir) = FaultyStore::create();
        let metrics = RecorderMetrics::default();
        let mut buffer = buffer_with(&[3, 1, 2]);

        flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Manual);

        assert_eq!(store.call_log(), vec!["upsert", "upsert", "upsert", "insert"]);
    }

    #[test]
    fn test_insert_failure_rolls_back_and_keeps_buffer() {
        let (store, _dir) = FaultyStore::create();
        store.set_fault(Some(Fault::Insert));
        let metrics = RecorderMetrics::default();
        let mut buffer = buffer_with(&[42, 7]);

        let outcome = flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Timer);

        assert_eq!(outcome, FlushOutcome::Failed { pending: 2 });
        assert_eq!(buffer.keys(), &[42, 7]);
        // The upserts that preceded the failure were rolled back
        assert_eq!(store.inner().count_distinct_chats().unwrap(), 0);
        assert_eq!(store.inner().count_events().unwrap(), 0);
        assert_eq!(metrics.snapshot().failed_flushes, 1);

        // The retry persists the same events exactly once
        store.set_fault(None);
        let outcome = flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Timer);
        assert_eq!(outcome, FlushOutcome::Flushed { events: 2, chats: 2 });
        assert_eq!(store.inner().count_events().unwrap(), 2);
    }

    #[test]
    fn test_begin_failure_keeps_buffer() {
        let (store, _dir) = FaultyStore::create();
        store.set_fault(Some(Fault::Begin));
        let metrics = RecorderMetrics::default();
        let mut buffer = buffer_with(&[1]);

        let outcome = flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Manual);

        assert!(outcome.is_failed());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_failure_defers_size_trigger() {
        let (store, _dir) = FaultyStore::create();
        store.set_fault(Some(Fault::Upsert));
        let metrics = RecorderMetrics::default();
        let mut buffer = PendingBuffer::new(2);
        buffer.push(1, 100);
        buffer.push(2, 100);
        assert!(buffer.size_trigger_reached());

        flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Size);

        assert!(!buffer.size_trigger_reached());
    }

    #[test]
    fn test_panic_is_contained() {
        let (store, _dir) = FaultyStore::create();
        store.set_fault(Some(Fault::Panic));
        let metrics = RecorderMetrics::default();
        let mut buffer = buffer_with(&[9, 9]);

        let outcome = flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Manual);

        assert_eq!(outcome, FlushOutcome::Failed { pending: 2 });
        assert_eq!(store.inner().count_distinct_chats().unwrap(), 0);

        // The writer connection was released by the unwinding transaction
        store.set_fault(None);
        let outcome = flush_pending(&store, &mut buffer, 999, &metrics, FlushTrigger::Manual);
        assert_eq!(outcome, FlushOutcome::Flushed { events: 2, chats: 1 });
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"boom".to_string()), "boom");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
