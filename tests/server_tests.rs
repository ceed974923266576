//! Front-end session tests
//!
//! Feed command scripts through `UsageServer::run` and check the replies
//! alongside what lands in the store.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use usage_stats::server::UsageServer;
use usage_stats::{PendingSelections, RecorderConfig, ReportAccess, SqliteStore, StatsRecorder, StatsReport};

const ADMIN: i64 = 1001;

fn create_server() -> (UsageServer, Arc<SqliteStore>, tokio::task::JoinHandle<()>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(SqliteStore::open(temp_dir.path().join("usage.db")).expect("Failed to open store"));
    let config = RecorderConfig::default().with_flush_interval(Duration::from_secs(3600));
    let (recorder, handle) = StatsRecorder::spawn(store.clone(), config);
    let server = UsageServer::new(
        recorder,
        Arc::new(PendingSelections::default()),
        ReportAccess::new(Some(ADMIN)),
    );
    (server, store, handle, temp_dir)
}

async fn run_script(server: &UsageServer, script: &str) -> Vec<String> {
    let mut output = Vec::new();
    server.run(script.as_bytes(), &mut output).await.unwrap();
    String::from_utf8(output).unwrap().lines().map(str::to_string).collect()
}

async fn wait_for_pending(server: &UsageServer, expected: usize) {
    for _ in 0..500 {
        if server.recorder().pending_len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pending buffer never reached {}", expected);
}

#[tokio::test]
async fn test_session_records_and_reports() {
    let (server, store, handle, _temp_dir) = create_server();

    let replies = run_script(&server, "event 42\nevent 7\n\nevent 42\nphoto 9 file-abc\nchoose 7 9 level_3\n").await;
    assert_eq!(
        replies,
        vec!["ok", "ok", "ok", "choose a level: 1-10", "level 3 selected for file-abc"]
    );

    let replies = run_script(&server, "photo 9 file-def\nchoose 7 9 level_11\nchoose 7 9 level_2\n").await;
    assert_eq!(replies[1], "error: invalid level: level_11");
    assert_eq!(replies[2], "level 2 selected for file-def");

    wait_for_pending(&server, 6).await;

    let replies = run_script(&server, "stats 5\nstats 1001\n").await;
    assert_eq!(replies[0], "error: not authorized");
    assert_eq!(replies[1], "Usage statistics:");
    assert!(replies.contains(&"  last hour:  6".to_string()));
    assert!(replies.contains(&"  last month: 6".to_string()));
    assert_eq!(replies.last().unwrap(), "Users (all time): 2");

    // The report forced a flush
    assert_eq!(store.count_events().unwrap(), 6);
    assert_eq!(server.recorder().pending_len(), 0);

    server.recorder().shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_session_rejects_bad_input() {
    let (server, store, handle, _temp_dir) = create_server();

    let replies = run_script(&server, "event\nevent abc\nfrobnicate\nchoose 3 9 level_11\nchoose 3 9 level_2\n").await;
    assert_eq!(replies.len(), 5);
    assert_eq!(replies[0], "error: usage: event <chat_id>");
    assert_eq!(replies[1], "error: invalid chat_id: abc");
    assert_eq!(replies[2], "error: unknown command: frobnicate");
    // Nothing pending for sender 9, so the level is never looked at
    assert_eq!(replies[3], "no pending item");
    assert_eq!(replies[4], "no pending item");

    // Both callbacks still count as usage for chat 3
    wait_for_pending(&server, 2).await;
    let replies = run_script(&server, "flush\nflush\n").await;
    assert_eq!(replies, vec!["flushed 2 events for 1 chats", "nothing to flush"]);
    assert_eq!(store.count_events_for_chat(3).unwrap(), 2);

    server.recorder().shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_report_json_matches_counts() {
    let (server, _store, handle, _temp_dir) = create_server();

    run_script(&server, "event 1\nevent 2\nevent 3\n").await;
    wait_for_pending(&server, 3).await;

    let report = StatsReport::gather(server.recorder()).unwrap();
    assert_eq!(report.last_day, 3);
    assert_eq!(report.total_chats, 3);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["lastWeek"], 3);
    assert_eq!(json["totalChats"], 3);

    let replies = run_script(&server, "metrics\n").await;
    let metrics: serde_json::Value = serde_json::from_str(&replies[0]).unwrap();
    assert_eq!(metrics["queued"], 3);
    assert_eq!(metrics["eventsFlushed"], 3);

    server.recorder().shutdown();
    handle.await.unwrap();
}
