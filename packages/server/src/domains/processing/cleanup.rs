//! Periodic housekeeping for the jobs table.
//!
//! Terminal jobs older than the retention window are pruned so session
//! snapshots and the pending scan stay fast. Scheduling is itself a job:
//! a timer enqueues `periodic-cleanup`, and the worker pool runs it like any
//! other work.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::kernel::traits::BaseJobStore;

/// How long finished jobs stay queryable.
pub fn retention() -> chrono::Duration {
    chrono::Duration::days(7)
}

/// One cleanup pass. The returned value becomes the cleanup job's `result`.
pub async fn run(store: &dyn BaseJobStore) -> Result<Value> {
    let cutoff = Utc::now() - retention();
    let pruned = store.prune_terminal_before(cutoff).await?;
    info!(pruned, "pruned terminal jobs");
    Ok(json!({ "pruned": pruned, "cutoff": cutoff }))
}

/// Enqueue a cleanup job every `interval` until `shutdown` is cancelled.
pub fn spawn_schedule(
    store: Arc<dyn BaseJobStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        // The startup tick would race the first real submissions; skip it
        tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {}
            }
            if let Err(e) = super::handlers::submit_cleanup_job(store.as_ref()).await {
                error!(error = %e, "failed to enqueue cleanup job");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::{InMemoryJobStore, Job, JobStatus};
    use serde_json::json;

    #[tokio::test]
    async fn run_prunes_only_beyond_retention() {
        let store = InMemoryJobStore::new();

        let mut old = Job::pending("flyer-processing", json!({}));
        old.status = JobStatus::Completed;
        old.updated = Utc::now() - chrono::Duration::days(8);

        let mut recent = Job::pending("flyer-processing", json!({}));
        recent.status = JobStatus::Failed;
        recent.updated = Utc::now() - chrono::Duration::days(2);

        store.write(&old).await.unwrap();
        store.write(&recent).await.unwrap();

        let result = run(&store).await.unwrap();
        assert_eq!(result["pruned"], 1);
        assert!(store.read(old.id).await.unwrap().is_none());
        assert!(store.read(recent.id).await.unwrap().is_some());
    }
}
