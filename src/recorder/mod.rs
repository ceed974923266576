//! Buffered usage-event recorder
//!
//! - `StatsRecorder`: cloneable producer/query handle
//! - `EventLoop`: the single consumer that owns the flush triggers
//! - `PendingBuffer`: events awaiting persistence
//! - `RecorderMetrics`: drop/flush counters
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌──────────────┐ try_send ┌─────────────┐  recv  ┌────────────┐ ≥ threshold ┌─────────────┐
//! │ record_event │─────────►│ mpsc (1000) │───────►│ EventLoop  │────────────►│ flush (1 tx)│
//! └──────────────┘  full ⇒  └─────────────┘        │ + buffer   │  timer tick │ chats+events│
//!                   drop                           └────────────┘  shutdown   └─────────────┘
//!
//! Read Path:
//! get_stats(period) / get_active_chats_count() ───► Storage (optionally after flush())
//! ```

mod buffer;
mod config;
mod event_loop;
mod flush;
mod metrics;
mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::PendingBuffer;
pub use config::{
    RecorderConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_FLUSH_INTERVAL, DEFAULT_FLUSH_THRESHOLD,
    DEFAULT_INSERT_CHUNK_SIZE, DEFAULT_MAX_PENDING, MAX_FLUSH_INTERVAL,
};
pub use event_loop::EventLoop;
pub use flush::{FlushOutcome, FlushTrigger};
pub use metrics::{MetricsSnapshot, RecorderMetrics};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{RecorderError, Result};
use crate::storage::Storage;
use crate::types::ChatId;

/// State shared by every handle and the event loop
pub(crate) struct Shared {
    store: Arc<dyn Storage>,
    buffer: Mutex<PendingBuffer>,
    metrics: RecorderMetrics,
    config: RecorderConfig,
    closed: AtomicBool,
}

impl Shared {
    /// Append one received event; true when the size trigger fired
    pub(crate) fn append(&self, chat_id: ChatId) -> bool {
        let mut buffer = self.buffer.lock();
        self.push_locked(&mut buffer, chat_id);
        buffer.size_trigger_reached()
    }

    pub(crate) fn push_locked(&self, buffer: &mut PendingBuffer, chat_id: ChatId) {
        if !buffer.push(chat_id, self.config.max_pending) {
            self.metrics.record_dropped_overflow();
            tracing::warn!(
                chat_id,
                max_pending = self.config.max_pending,
                "pending buffer is full, dropping event"
            );
        }
    }

    pub(crate) fn flush(&self, trigger: FlushTrigger) -> FlushOutcome {
        let mut buffer = self.buffer.lock();
        self.flush_locked(&mut buffer, trigger)
    }

    /// Size-triggered flush. Re-checked under the lock: a manual flush may
    /// have emptied the buffer since the append.
    pub(crate) fn flush_if_due(&self) -> FlushOutcome {
        let mut buffer = self.buffer.lock();
        if !buffer.size_trigger_reached() {
            return FlushOutcome::Empty;
        }
        self.flush_locked(&mut buffer, FlushTrigger::Size)
    }

    fn flush_locked(&self, buffer: &mut PendingBuffer, trigger: FlushTrigger) -> FlushOutcome {
        flush::flush_pending(
            self.store.as_ref(),
            buffer,
            self.config.insert_chunk_size,
            &self.metrics,
            trigger,
        )
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Handle for recording usage events and reading usage stats
///
/// Cheap to clone; every clone feeds the same event loop.
#[derive(Clone)]
pub struct StatsRecorder {
    shared: Arc<Shared>,
    intake: mpsc::Sender<ChatId>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl StatsRecorder {
    /// Create a recorder and the event loop that must be run for it
    pub fn new(store: Arc<dyn Storage>, config: RecorderConfig) -> (Self, EventLoop) {
        let config = config.normalized();
        let (intake_tx, intake_rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            store,
            buffer: Mutex::new(PendingBuffer::new(config.flush_threshold)),
            metrics: RecorderMetrics::default(),
            config,
            closed: AtomicBool::new(false),
        });

        let recorder = Self {
            shared: Arc::clone(&shared),
            intake: intake_tx,
            shutdown: Arc::new(shutdown_tx),
        };
        let event_loop = EventLoop::new(shared, intake_rx, shutdown_rx);

        (recorder, event_loop)
    }

    /// Create a recorder and spawn its event loop on the current tokio runtime
    pub fn spawn(store: Arc<dyn Storage>, config: RecorderConfig) -> (Self, JoinHandle<()>) {
        let (recorder, event_loop) = Self::new(store, config);
        let handle = tokio::spawn(event_loop.run());
        (recorder, handle)
    }

    /// Queue a usage event without blocking
    ///
    /// A full intake channel drops the event with a warning and still returns
    /// `Ok`. After `shutdown` the event is rejected with `RecorderError::Closed`.
    pub fn record_event(&self, chat_id: ChatId) -> Result<()> {
        if self.shared.is_closed() {
            self.shared.metrics.record_dropped_closed();
            return Err(RecorderError::Closed);
        }

        match self.intake.try_send(chat_id) {
            Ok(()) => {
                self.shared.metrics.record_queued();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.shared.metrics.record_dropped_full();
                tracing::warn!(chat_id, "events channel is full, dropping event");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                self.shared.metrics.record_dropped_closed();
                Err(RecorderError::Closed)
            }
        }
    }

    /// Persist everything currently buffered, blocking until done
    ///
    /// Performs SQLite I/O on the calling thread; from async code run it
    /// through `tokio::task::spawn_blocking`.
    pub fn flush(&self) -> FlushOutcome {
        self.shared.flush(FlushTrigger::Manual)
    }

    /// Stop accepting events and ask the event loop to flush and exit
    ///
    /// Await the loop's `JoinHandle` to know when the final flush is done.
    pub fn shutdown(&self) {
        self.shared.close();
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Number of events buffered but not yet persisted
    pub fn pending_len(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.shared.config
    }
}
