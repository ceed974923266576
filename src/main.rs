//! Usage Stats - Binary Entry Point
//!
//! Reads commands from stdin, records usage through the buffered recorder
//! and flushes everything on EOF or Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{stdin, stdout, BufReader};
use tracing_subscriber::EnvFilter;

use usage_stats::server::UsageServer;
use usage_stats::{AppConfig, PendingSelections, ReportAccess, SqliteStore, StatsRecorder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine, the environment may already be set
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    let config = AppConfig::from_env()?;

    // RUST_LOG wins over LOG_LEVEL when both are set
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        db_path = %config.db_path.display(),
        admin_configured = config.stats_admin_id.is_some(),
        flush_interval_secs = config.recorder.flush_interval.as_secs(),
        "configuration loaded"
    );

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let (recorder, event_loop) = StatsRecorder::spawn(store, config.recorder.clone());

    let selections = Arc::new(PendingSelections::new(
        config.selection_ttl,
        usage_stats::session::DEFAULT_SELECTION_CAPACITY,
    ));
    let server = UsageServer::new(
        recorder.clone(),
        Arc::clone(&selections),
        ReportAccess::new(config.stats_admin_id),
    );

    // Expired selections would otherwise linger until their sender returns
    let purge_interval = config.selection_ttl.max(Duration::from_secs(1));
    let purger = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        loop {
            ticker.tick().await;
            let removed = selections.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "purged expired selections");
            }
        }
    });

    tracing::info!(version = usage_stats::VERSION, "usage stats recorder ready");

    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    // Always returns after the final flush, even when stdout broke
    let served = server
        .serve(BufReader::new(stdin()), stdout(), stop, event_loop)
        .await;
    purger.abort();

    let metrics = recorder.metrics();
    tracing::info!(
        flushed = metrics.events_flushed,
        dropped = metrics.dropped(),
        "usage stats recorder stopped"
    );

    served?;
    Ok(())
}
