//! Usage Stats Recorder
//!
//! Records usage events keyed by chat id without blocking the caller,
//! batches them in memory and persists them to SQLite in one transaction
//! per flush.
//!
//! # Features
//!
//! - **Non-blocking intake**: bounded channel, overload drops instead of stalling
//! - **Batched writes**: flush at 1000 buffered events or every 5 minutes
//! - **Atomic flushes**: chat upserts and event inserts commit together
//! - **Graceful shutdown**: queued events are flushed before the loop exits
//! - **Windowed stats**: hour/day/week/month counts and all-time chats
//!
//! # Modules
//!
//! - `types`: Chat/event records and stats periods
//! - `storage`: Storage traits and the SQLite implementation
//! - `recorder`: Intake channel, pending buffer, flush engine, queries
//! - `report`: Formatted usage report and its access check
//! - `session`: Pending level selections per sender
//! - `server`: Line-command front-end used by the binary
//! - `config`: Environment-based configuration
//! - `utils`: Timestamp conversions
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use usage_stats::{RecorderConfig, SqliteStore, StatsRecorder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("usage_stats.db")?);
//!     let (recorder, handle) = StatsRecorder::spawn(store, RecorderConfig::default());
//!
//!     recorder.record_event(42)?;
//!
//!     recorder.shutdown();
//!     handle.await?;
//!     println!("events today: {}", recorder.get_stats("day")?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod recorder;
pub mod report;
pub mod server;
pub mod session;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{AppConfig, ConfigError};
pub use error::{RecorderError, Result};
pub use recorder::{EventLoop, FlushOutcome, MetricsSnapshot, RecorderConfig, StatsRecorder};
pub use report::{ReportAccess, StatsReport};
pub use session::{PendingSelections, SelectionLevel};
pub use storage::{SqliteStore, Storage, StorageTx, StoreError};
pub use types::{ChatId, SenderId, StatsPeriod};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
