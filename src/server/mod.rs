//! Line-oriented front-end
//!
//! Stands in for the chat front-end: each input line is a command that
//! records usage, manages pending selections or asks for the report. Every
//! command gets exactly one reply line (the report spans several).

mod command;

pub use command::{Command, CommandError};

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::recorder::{FlushOutcome, StatsRecorder};
use crate::report::{ReportAccess, StatsReport};
use crate::session::{PendingSelections, SelectionLevel};
use crate::types::{ChatId, SenderId};

/// Front-end state: the recorder handle plus per-sender selections
#[derive(Clone)]
pub struct UsageServer {
    recorder: StatsRecorder,
    selections: Arc<PendingSelections>,
    access: ReportAccess,
}

impl UsageServer {
    pub fn new(recorder: StatsRecorder, selections: Arc<PendingSelections>, access: ReportAccess) -> Self {
        Self {
            recorder,
            selections,
            access,
        }
    }

    pub fn recorder(&self) -> &StatsRecorder {
        &self.recorder
    }

    /// Serve commands until `reader` reaches EOF
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Commands may flush or query SQLite
            let server = self.clone();
            let command = trimmed.to_string();
            let reply = tokio::task::spawn_blocking(move || server.handle_line(&command))
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok(())
    }

    /// Serve until EOF or until `stop` resolves, then shut the recorder down
    /// and wait for `event_loop` to finish its final flush
    ///
    /// An I/O error from serving is returned only after that flush.
    pub async fn serve<R, W, S>(
        &self,
        reader: R,
        writer: W,
        stop: S,
        event_loop: JoinHandle<()>,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let served = tokio::select! {
            served = self.run(reader, writer) => served,
            _ = stop => {
                tracing::info!("stop requested");
                Ok(())
            }
        };
        if let Err(e) = &served {
            tracing::error!(error = %e, "front-end stopped with an error");
        }

        self.recorder.shutdown();
        if let Err(e) = event_loop.await {
            tracing::error!(error = %e, "event loop task failed");
        }
        served
    }

    /// Parse and execute one command, returning the reply text
    pub fn handle_line(&self, line: &str) -> String {
        match line.parse::<Command>() {
            Ok(command) => self.execute(command),
            Err(e) => format!("error: {}", e),
        }
    }

    pub fn execute(&self, command: Command) -> String {
        match command {
            Command::Event { chat_id } => self.handle_event(chat_id),
            Command::Photo { sender_id, token } => {
                self.selections.insert(sender_id, token);
                "choose a level: 1-10".to_string()
            }
            Command::Choose {
                chat_id,
                sender_id,
                data,
            } => self.handle_choose(chat_id, sender_id, &data),
            Command::Stats { sender_id } => self.handle_stats(sender_id),
            Command::Flush => match self.recorder.flush() {
                FlushOutcome::Empty => "nothing to flush".to_string(),
                FlushOutcome::Flushed { events, chats } => {
                    format!("flushed {} events for {} chats", events, chats)
                }
                FlushOutcome::Failed { pending } => {
                    format!("error: flush failed, {} events still pending", pending)
                }
            },
            Command::Metrics => match serde_json::to_string(&self.recorder.metrics()) {
                Ok(json) => json,
                Err(e) => format!("error: {}", e),
            },
        }
    }

    fn handle_event(&self, chat_id: ChatId) -> String {
        match self.recorder.record_event(chat_id) {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("error: {}", e),
        }
    }

    fn handle_choose(&self, chat_id: ChatId, sender_id: SenderId, data: &str) -> String {
        // Every callback counts as usage, even when it cannot be served
        if let Err(e) = self.recorder.record_event(chat_id) {
            tracing::debug!(chat_id, error = %e, "usage event not recorded");
        }

        if !self.selections.contains(sender_id) {
            return "no pending item".to_string();
        }

        // An invalid level leaves the selection in place for another try
        let level = match SelectionLevel::parse_callback(data) {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!(sender_id, data, "rejected level callback");
                return format!("error: {}", e);
            }
        };

        match self.selections.take(sender_id) {
            Some(token) => format!("level {} selected for {}", level, token),
            None => "no pending item".to_string(),
        }
    }

    fn handle_stats(&self, sender_id: SenderId) -> String {
        if !self.access.allows(sender_id) {
            tracing::debug!(sender_id, "stats requested by unauthorized sender");
            return "error: not authorized".to_string();
        }

        match StatsReport::gather(&self.recorder) {
            Ok(report) => report.to_string(),
            Err(e) => {
                tracing::error!(error = %e, "failed to gather usage report");
                format!("error: {}", e)
            }
        }
    }
}
