//! Hook-event ingestion for PromptVault
//!
//! Drains a directory queue of JSONL hook events into the store. Each line is
//! handled on its own: a bad line is counted and logged, the rest of the file
//! still lands.

pub mod error;
pub mod event;
pub mod ingester;
pub mod queue;

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

pub use error::IngestError;
pub use event::{EventKind, HookEvent};
pub use ingester::{Ingester, Outcome};
pub use queue::Queue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files: usize,
    pub events_ingested: usize,
    pub events_skipped: usize,
    pub events_failed: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.files += other.files;
        self.events_ingested += other.events_ingested;
        self.events_skipped += other.events_skipped;
        self.events_failed += other.events_failed;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Ingest every line of one file. Does not move the file.
pub async fn ingest_file(ingester: &Ingester, path: &Path) -> anyhow::Result<IngestReport> {
    let contents = tokio::fs::read_to_string(path).await?;
    let mut report = IngestReport {
        files: 1,
        ..Default::default()
    };

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match HookEvent::from_line(line) {
            Ok(event) => ingester.ingest(&event).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(Outcome::Stored { .. }) | Ok(Outcome::Acknowledged) => report.events_ingested += 1,
            Ok(Outcome::Skipped) => report.events_skipped += 1,
            Err(e) => {
                tracing::warn!(file = %path.display(), line = idx + 1, error = %e, "Rejected hook event");
                report.events_failed += 1;
            }
        }
    }

    Ok(report)
}

/// One pass over the queue: ingest and archive every pending file.
pub async fn drain_queue(ingester: &Ingester, queue: &Queue) -> anyhow::Result<IngestReport> {
    let mut total = IngestReport::default();

    for path in queue.pending().await? {
        // An unreadable file is archived as failed so it cannot block the queue.
        let report = match ingest_file(ingester, &path).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Unreadable queue file");
                IngestReport {
                    files: 1,
                    events_failed: 1,
                    ..Default::default()
                }
            }
        };
        let dest = queue.archive(&path, report.events_failed == 0).await?;
        tracing::info!(
            file = %path.display(),
            archived = %dest.display(),
            ingested = report.events_ingested,
            skipped = report.events_skipped,
            failed = report.events_failed,
            "Drained queue file"
        );
        total.merge(report);
    }

    Ok(total)
}

/// Poll the queue until the shutdown signal fires.
pub async fn run_ingest_loop(
    ingester: Ingester,
    queue: Queue,
    poll_interval_seconds: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(Duration::from_secs(poll_interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        queue = %queue.root().display(),
        interval_secs = poll_interval_seconds,
        "Ingest worker started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match drain_queue(&ingester, &queue).await {
                    Ok(report) if !report.is_empty() => {
                        tracing::info!(?report, "Ingest tick complete");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Ingest tick failed"),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Ingest worker shutting down...");
                break;
            }
        }
    }
}
