//! The single consumer of the intake channel

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{FlushOutcome, FlushTrigger, Shared};
use crate::types::ChatId;

/// Consumer loop owning the size, timer and shutdown flush triggers
///
/// Run exactly once, usually via `tokio::spawn(event_loop.run())`.
pub struct EventLoop {
    shared: Arc<Shared>,
    intake: mpsc::Receiver<ChatId>,
    shutdown: watch::Receiver<bool>,
}

impl EventLoop {
    pub(crate) fn new(
        shared: Arc<Shared>,
        intake: mpsc::Receiver<ChatId>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shared,
            intake,
            shutdown,
        }
    }

    /// Receive events until shutdown, then flush what is left
    ///
    /// Exits on `StatsRecorder::shutdown` or once every handle is dropped.
    pub async fn run(mut self) {
        let period = self.shared.config.flush_interval;
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            flush_interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            flush_threshold = self.shared.config.flush_threshold,
            "usage stats event loop started"
        );

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    // Err: every handle is gone, nobody can record anymore
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }

                received = self.intake.recv() => match received {
                    Some(chat_id) => {
                        if self.shared.append(chat_id) {
                            flush_blocking(Arc::clone(&self.shared), FlushTrigger::Size).await;
                        }
                    }
                    None => break,
                },

                _ = timer.tick() => {
                    flush_blocking(Arc::clone(&self.shared), FlushTrigger::Timer).await;
                }
            }
        }

        self.finish().await;
    }

    /// Close the intake, buffer whatever is still queued and flush it
    async fn finish(&mut self) -> FlushOutcome {
        self.shared.close();
        self.intake.close();

        let drained = {
            let mut buffer = self.shared.buffer.lock();
            let mut drained = 0usize;
            while let Ok(chat_id) = self.intake.try_recv() {
                self.shared.push_locked(&mut buffer, chat_id);
                drained += 1;
            }
            drained
        };

        let outcome = flush_blocking(Arc::clone(&self.shared), FlushTrigger::Shutdown).await;
        match outcome {
            FlushOutcome::Failed { pending } => {
                tracing::error!(pending, "final flush failed, events remain buffered");
            }
            _ => tracing::info!(drained, ?outcome, "usage stats event loop stopped"),
        }
        outcome
    }
}

/// Run one flush on tokio's blocking pool and wait for it
async fn flush_blocking(shared: Arc<Shared>, trigger: FlushTrigger) -> FlushOutcome {
    let worker = Arc::clone(&shared);
    let task = tokio::task::spawn_blocking(move || match trigger {
        FlushTrigger::Size => worker.flush_if_due(),
        other => worker.flush(other),
    });
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(%trigger, error = %e, "flush task did not complete");
            FlushOutcome::Failed {
                pending: shared.buffer.lock().len(),
            }
        }
    }
}
