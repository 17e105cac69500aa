//! Queue drain tests against a temp directory and an in-memory store.

use std::time::Duration;

use promptvault_core::Store;
use promptvault_ingest::queue::{FAILED_DIR, PROCESSED_DIR};
use promptvault_ingest::{drain_queue, run_ingest_loop, IngestReport, Ingester, Queue};
use tokio::sync::broadcast;

const MIGRATIONS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../migrations");

async fn make_ingester() -> Ingester {
    Ingester::new(Store::open_in_memory(MIGRATIONS_DIR).await.unwrap())
}

const SESSION_FILE: &str = r#"{"event":"SessionStart","session_id":"sess-1","data":{"cwd":"/repo"}}
{"event":"UserPromptSubmit","session_id":"sess-1","data":{"prompt":"hello"}}

{"event":"PostToolUse","session_id":"sess-1","data":{"response":"hi there","execution_time":120}}
{"event":"Stop","session_id":"sess-1"}
"#;

// ===========================================================================
// TEST 1: a clean file is ingested and moved to processed/
// ===========================================================================
#[tokio::test]
async fn test_clean_file_is_processed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("001.jsonl"), SESSION_FILE).unwrap();

    let ingester = make_ingester().await;
    let queue = Queue::new(dir.path());
    let report = drain_queue(&ingester, &queue).await.unwrap();

    assert_eq!(
        report,
        IngestReport {
            files: 1,
            events_ingested: 4,
            events_skipped: 0,
            events_failed: 0,
        }
    );
    assert!(dir.path().join(PROCESSED_DIR).join("001.jsonl").exists());
    assert!(!dir.path().join("001.jsonl").exists());

    let store = ingester.store();
    let conversation = store
        .find_latest_conversation_by_session("sess-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.working_directory.as_deref(), Some("/repo"));
    assert_eq!(conversation.prompt_count, 1);
    assert_eq!(conversation.total_characters, 13);
    assert_eq!(store.list_messages(conversation.id).await.unwrap().len(), 2);
}

// ===========================================================================
// TEST 2: rejected lines route the file to failed/ but good lines still land
// ===========================================================================
#[tokio::test]
async fn test_partial_file_goes_to_failed() {
    let dir = tempfile::tempdir().unwrap();
    let contents = concat!(
        r#"{"event":"UserPromptSubmit","session_id":"sess-2","data":{"prompt":"kept"}}"#,
        "\n",
        "not json at all\n",
        r#"{"event":"UserPromptSubmit","data":{"prompt":"no session"}}"#,
        "\n",
        r#"{"event":"PreCompact","session_id":"sess-2"}"#,
        "\n",
    );
    std::fs::write(dir.path().join("002.jsonl"), contents).unwrap();

    let ingester = make_ingester().await;
    let report = drain_queue(&ingester, &Queue::new(dir.path())).await.unwrap();

    assert_eq!(report.events_ingested, 1);
    assert_eq!(report.events_skipped, 1);
    assert_eq!(report.events_failed, 2);
    assert!(dir.path().join(FAILED_DIR).join("002.jsonl").exists());

    let stats = ingester.store().stats().await.unwrap();
    assert_eq!(stats.conversations, 1);
    assert_eq!(stats.messages, 1);
}

// ===========================================================================
// TEST 3: files drain in name order and share conversations by session
// ===========================================================================
#[tokio::test]
async fn test_multiple_files_share_session() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("b.jsonl"),
        r#"{"event":"PostToolUse","session_id":"s","data":{"response":"second"}}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("a.jsonl"),
        r#"{"event":"UserPromptSubmit","session_id":"s","data":{"prompt":"first"}}"#,
    )
    .unwrap();

    let ingester = make_ingester().await;
    let report = drain_queue(&ingester, &Queue::new(dir.path())).await.unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.events_ingested, 2);

    let store = ingester.store();
    assert_eq!(store.count_conversations().await.unwrap(), 1);
    let c = store
        .find_latest_conversation_by_session("s")
        .await
        .unwrap()
        .unwrap();
    let messages = store.list_messages(c.id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second"]);

    // Second pass finds nothing
    let again = drain_queue(&ingester, &Queue::new(dir.path())).await.unwrap();
    assert!(again.is_empty());
}

// ===========================================================================
// TEST 4: a non-UTF-8 file is archived as failed and later files still drain
// ===========================================================================
#[tokio::test]
async fn test_unreadable_file_does_not_block_queue() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.jsonl"), [0xff, 0xfe, b'\n']).unwrap();
    std::fs::write(
        dir.path().join("b.jsonl"),
        r#"{"event":"UserPromptSubmit","session_id":"s","data":{"prompt":"after"}}"#,
    )
    .unwrap();

    let ingester = make_ingester().await;
    let queue = Queue::new(dir.path());
    let report = drain_queue(&ingester, &queue).await.unwrap();

    assert_eq!(report.files, 2);
    assert_eq!(report.events_ingested, 1);
    assert_eq!(report.events_failed, 1);
    assert!(dir.path().join(FAILED_DIR).join("a.jsonl").exists());
    assert!(dir.path().join(PROCESSED_DIR).join("b.jsonl").exists());
    assert!(queue.pending().await.unwrap().is_empty());
    assert_eq!(ingester.store().stats().await.unwrap().messages, 1);
}

// ===========================================================================
// TEST 5: the poll loop drains on its first tick and stops on shutdown
// ===========================================================================
#[tokio::test]
async fn test_ingest_loop_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("001.jsonl"), SESSION_FILE).unwrap();

    let ingester = make_ingester().await;
    let (tx, _rx) = broadcast::channel(1);
    let handle = tokio::spawn(run_ingest_loop(
        ingester.clone(),
        Queue::new(dir.path()),
        60,
        tx.subscribe(),
    ));

    let processed = dir.path().join(PROCESSED_DIR).join("001.jsonl");
    for _ in 0..100 {
        if processed.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(processed.exists());

    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
