//! Job handlers for submission processing.
//!
//! Each handler walks its job through named phases, reporting progress after
//! every phase and checking for cancellation between them. The heavy lifting
//! (OCR, structuring, dedup) happens in the extraction service; handlers own
//! pacing and progress semantics.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::Value;

use crate::kernel::deps::ServerDeps;
use crate::kernel::jobs::{
    Job, JobContext, JobRegistry, ProgressDetails, CIVIC_ENGAGEMENT_PROCESSING, FLYER_PROCESSING,
    PERIODIC_CLEANUP, PRIVATE_EVENT_PROCESSING,
};
use crate::kernel::traits::{BaseExtractionService, BaseJobStore};

use super::cleanup;

/// Wire every processing job type into the registry.
pub fn register_handlers(registry: &mut JobRegistry, deps: &ServerDeps) {
    for job_type in [
        FLYER_PROCESSING,
        PRIVATE_EVENT_PROCESSING,
        CIVIC_ENGAGEMENT_PROCESSING,
    ] {
        let extraction = Arc::clone(&deps.extraction);
        registry.register(job_type, move |job, ctx| {
            let extraction = Arc::clone(&extraction);
            async move { process_submission(job, ctx, extraction).await }
        });
    }

    let store = Arc::clone(&deps.job_store);
    registry.register(PERIODIC_CLEANUP, move |_job, _ctx| {
        let store = Arc::clone(&store);
        async move { cleanup::run(store.as_ref()).await }
    });
}

fn details(current: u32, total: u32, description: &str) -> ProgressDetails {
    ProgressDetails {
        current_step: current,
        total_steps: total,
        step_progress: 100,
        step_description: Some(description.to_string()),
    }
}

/// Shared three-phase pipeline: receive, extract, publish. The extraction
/// service branches on the job type internally.
async fn process_submission(
    job: Job,
    ctx: JobContext,
    extraction: Arc<dyn BaseExtractionService>,
) -> Result<Value> {
    ctx.report_step(10, "Preparing submission", details(1, 3, "Submission received"))
        .await?;
    if ctx.is_cancelled() {
        return Err(anyhow!("cancelled before extraction"));
    }

    ctx.report_step(30, "Extracting details", details(2, 3, "Reading your submission"))
        .await?;
    let result = extraction.extract(&job.job_type, &job.data).await?;
    if ctx.is_cancelled() {
        return Err(anyhow!("cancelled after extraction"));
    }

    ctx.report_step(90, "Publishing", details(3, 3, "Adding to the community calendar"))
        .await?;
    Ok(result)
}

/// Enqueue the housekeeping job. Called on a timer from
/// [`cleanup::spawn_schedule`].
pub async fn submit_cleanup_job(store: &dyn BaseJobStore) -> Result<Job> {
    let job = Job::pending(
        PERIODIC_CLEANUP,
        serde_json::json!({ "scheduledAt": Utc::now() }),
    );
    store.write(&job).await?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::{InMemoryJobStore, JobEventBus, JobStatus};
    use crate::kernel::test_dependencies::TestDependencies;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn ctx_for(job: &Job, store: Arc<InMemoryJobStore>) -> JobContext {
        JobContext::new(job.id, store, JobEventBus::new(), CancellationToken::new())
    }

    #[tokio::test]
    async fn register_covers_every_processing_type() {
        let deps = TestDependencies::new().into_deps();
        let mut registry = JobRegistry::new();
        register_handlers(&mut registry, &deps);

        for job_type in [
            FLYER_PROCESSING,
            PRIVATE_EVENT_PROCESSING,
            CIVIC_ENGAGEMENT_PROCESSING,
            PERIODIC_CLEANUP,
        ] {
            assert!(registry.contains(job_type), "missing handler: {job_type}");
        }
    }

    #[tokio::test]
    async fn submission_handler_returns_extraction_result() {
        let extraction = Arc::new(
            crate::kernel::test_dependencies::MockExtractionService::new()
                .queue_result(json!({"events": [{"title": "Night Market"}]})),
        );
        let store = Arc::new(InMemoryJobStore::new());
        let job = Job::pending(FLYER_PROCESSING, json!({"photoUrl": "https://x/y.jpg"}));
        store.write(&job).await.unwrap();

        let result =
            process_submission(job.clone(), ctx_for(&job, Arc::clone(&store)), extraction)
                .await
                .unwrap();
        assert_eq!(result["events"][0]["title"], "Night Market");

        let stored = store.read(job.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 90);
        assert_eq!(stored.progress_step.as_deref(), Some("Publishing"));
    }

    #[tokio::test]
    async fn cancelled_context_aborts_before_extraction() {
        let extraction =
            Arc::new(crate::kernel::test_dependencies::MockExtractionService::new());
        let store = Arc::new(InMemoryJobStore::new());
        let job = Job::pending(FLYER_PROCESSING, json!({}));
        store.write(&job).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let ctx = JobContext::new(job.id, store, JobEventBus::new(), token);

        let err = process_submission(job, ctx, extraction).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn cleanup_job_round_trips_through_registry() {
        let deps = TestDependencies::new().into_deps();
        let mut registry = JobRegistry::new();
        register_handlers(&mut registry, &deps);

        let mut stale = Job::pending("flyer-processing", json!({}));
        stale.status = JobStatus::Completed;
        stale.updated = Utc::now() - chrono::Duration::days(30);
        deps.job_store.write(&stale).await.unwrap();

        let job = submit_cleanup_job(deps.job_store.as_ref()).await.unwrap();
        let ctx = JobContext::new(
            Uuid::new_v4(),
            Arc::clone(&deps.job_store),
            JobEventBus::new(),
            CancellationToken::new(),
        );
        let result = registry.execute(job, ctx).await.unwrap();
        assert_eq!(result["pruned"], 1);
    }
}
