//! Worker pool: bounded-concurrency admission and execution of jobs.
//!
//! A single coordinating loop polls the Job Store for `pending` jobs on a
//! fixed interval and claims them FIFO until the number in `processing`
//! reaches the configured ceiling. Claimed jobs run in spawned tasks under a
//! wall-clock timeout measured from the claim.
//!
//! ```text
//! WorkerPool
//!     │
//!     ├─► Poll store (query_pending, FIFO by created)
//!     ├─► Claim: mark processing, emit Claimed event
//!     ├─► Dispatch to JobRegistry handler (spawned, under timeout)
//!     └─► Write terminal state, emit Completed/Failed event
//! ```
//!
//! There is no automatic retry: a failed job stays failed, and retrying is a
//! new `submit` call by the caller. A handler that outlives its timeout is
//! abandoned (the task keeps running detached) rather than aborted; the
//! store refuses its late writes once the row is terminal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{JobEvent, JobEventBus};
use super::registry::SharedJobRegistry;
use super::{Job, JobStatus, ProgressDetails};
use crate::kernel::traits::BaseJobStore;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Ceiling on jobs in `processing` at once.
    pub max_concurrent: usize,
    /// How often the coordinating loop polls for pending jobs.
    pub poll_interval: Duration,
    /// Wall-clock timeout per job, measured from the claim.
    pub job_timeout: Duration,
    /// How long shutdown waits for in-flight handlers before giving up.
    pub drain_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            poll_interval: Duration::from_millis(1000),
            job_timeout: Duration::from_millis(300_000),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// JobContext
// ============================================================================

/// Handle given to handlers for progress reporting and cooperative
/// cancellation.
#[derive(Clone)]
pub struct JobContext {
    job_id: Uuid,
    store: Arc<dyn BaseJobStore>,
    events: JobEventBus,
    cancel: CancellationToken,
}

impl JobContext {
    pub fn new(
        job_id: Uuid,
        store: Arc<dyn BaseJobStore>,
        events: JobEventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            store,
            events,
            cancel,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Whether cancellation was requested. Cancellation is cooperative only;
    /// a handler that never checks simply runs to completion or timeout.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when cancellation is requested (for use in `select!`).
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Report overall progress with a short human label.
    pub async fn report_progress(&self, progress: u8, step: &str) -> Result<()> {
        self.apply(progress, step, None).await
    }

    /// Report progress for a multi-phase handler.
    pub async fn report_step(
        &self,
        progress: u8,
        step: &str,
        details: ProgressDetails,
    ) -> Result<()> {
        self.apply(progress, step, Some(details)).await
    }

    async fn apply(
        &self,
        progress: u8,
        step: &str,
        details: Option<ProgressDetails>,
    ) -> Result<()> {
        let Some(mut job) = self.store.read(self.job_id).await? else {
            return Ok(());
        };
        // An abandoned (timed-out) handler may report after the terminal
        // write landed; those updates are discarded.
        if job.is_terminal() {
            debug!(job_id = %self.job_id, "dropping progress report for terminal job");
            return Ok(());
        }

        job.progress = job.progress.max(progress.min(100));
        job.progress_step = Some(step.to_string());
        if details.is_some() {
            job.progress_details = details;
        }
        job.touch();

        // The store re-checks terminal state under its own lock; a terminal
        // write landing between the read above and here refuses this one
        if !self.store.write(&job).await? {
            debug!(job_id = %self.job_id, "store refused progress write for terminal job");
            return Ok(());
        }
        self.events.publish(JobEvent::Progress { job });
        Ok(())
    }
}

// ============================================================================
// WorkerPool
// ============================================================================

/// Bounded-concurrency scheduler advancing jobs from `pending` to a terminal
/// state.
///
/// Explicitly constructed and explicitly lifetimed: created at process start,
/// torn down via the shutdown token passed to [`run`](Self::run), which drains
/// in-flight handlers before returning.
pub struct WorkerPool {
    store: Arc<dyn BaseJobStore>,
    registry: SharedJobRegistry,
    events: JobEventBus,
    config: WorkerPoolConfig,
    /// Cancellation tokens for in-flight jobs, for `cancel` and drain.
    running: RwLock<HashMap<Uuid, CancellationToken>>,
    in_flight: AtomicUsize,
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn BaseJobStore>,
        registry: SharedJobRegistry,
        events: JobEventBus,
    ) -> Self {
        Self::with_config(store, registry, events, WorkerPoolConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn BaseJobStore>,
        registry: SharedJobRegistry,
        events: JobEventBus,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            store,
            registry,
            events,
            config,
            running: RwLock::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn events(&self) -> &JobEventBus {
        &self.events
    }

    /// Create the `pending` row and return immediately; execution happens on
    /// a later poll cycle. Only the store write is synchronous.
    pub async fn submit(&self, mut job: Job) -> Result<Job> {
        job.status = JobStatus::Pending;
        job.touch();
        self.store.write(&job).await?;
        debug!(job_id = %job.id, job_type = %job.job_type, "job submitted");
        Ok(job)
    }

    /// Best-effort cancellation: signals the in-flight handler's token.
    /// No-op when the job is not running (terminal, pending, or unknown).
    pub async fn cancel(&self, job_id: Uuid) {
        if let Some(token) = self.running.read().await.get(&job_id) {
            info!(job_id = %job_id, "cancellation requested");
            token.cancel();
        }
    }

    /// Number of jobs this pool currently has in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run the coordinating loop until `shutdown` is cancelled, then drain.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            max_concurrent = self.config.max_concurrent,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            job_timeout_ms = self.config.job_timeout.as_millis() as u64,
            "worker pool starting"
        );

        let mut tick = tokio::time::interval(self.config.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {}
            }

            if let Err(e) = Arc::clone(&self).poll_once().await {
                error!(error = %e, "poll cycle failed");
            }
        }

        self.drain().await;
        info!("worker pool stopped");
        Ok(())
    }

    /// One admission pass: claim pending jobs oldest-first up to free
    /// capacity. Jobs past the ceiling wait for the next cycle.
    async fn poll_once(self: Arc<Self>) -> Result<()> {
        let capacity = self
            .config
            .max_concurrent
            .saturating_sub(self.in_flight.load(Ordering::SeqCst));
        if capacity == 0 {
            return Ok(());
        }

        let pending = self.store.query_pending().await?;
        if pending.is_empty() {
            return Ok(());
        }
        debug!(pending = pending.len(), capacity, "claiming jobs");

        for job in pending.into_iter().take(capacity) {
            Arc::clone(&self).claim_and_dispatch(job).await;
        }
        Ok(())
    }

    async fn claim_and_dispatch(self: Arc<Self>, mut job: Job) {
        job.status = JobStatus::Processing;
        job.touch();
        if let Err(e) = self.store.write(&job).await {
            error!(job_id = %job.id, error = %e, "failed to claim job");
            return;
        }

        let token = CancellationToken::new();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.running.write().await.insert(job.id, token.clone());
        self.events.publish(JobEvent::Claimed { job: job.clone() });

        tokio::spawn(async move {
            self.execute(job, token).await;
        });
    }

    async fn execute(self: Arc<Self>, job: Job, token: CancellationToken) {
        let job_id = job.id;
        let job_type = job.job_type.clone();
        let started = Instant::now();

        let ctx = JobContext::new(
            job_id,
            Arc::clone(&self.store),
            self.events.clone(),
            token.clone(),
        );
        let registry = Arc::clone(&self.registry);

        // The handler runs in its own task so a timeout can abandon it
        // without aborting: side effects of an overrunning handler are a
        // documented, accepted risk.
        let mut handler = tokio::spawn(async move { registry.execute(job, ctx).await });

        let outcome = tokio::select! {
            res = &mut handler => Some(match res {
                Ok(handler_result) => handler_result,
                Err(join_err) => Err(anyhow::anyhow!("handler panicked: {join_err}")),
            }),
            _ = tokio::time::sleep(self.config.job_timeout) => None,
        };

        match outcome {
            Some(Ok(result)) => {
                debug!(
                    job_id = %job_id,
                    job_type = %job_type,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "job succeeded"
                );
                self.finish(job_id, Terminal::Completed(result)).await;
            }
            Some(Err(e)) => {
                warn!(job_id = %job_id, job_type = %job_type, error = %e, "job failed");
                self.finish(
                    job_id,
                    Terminal::Failed {
                        error: "handler_error".to_string(),
                        message: e.to_string(),
                    },
                )
                .await;
            }
            None => {
                warn!(
                    job_id = %job_id,
                    job_type = %job_type,
                    timeout_ms = self.config.job_timeout.as_millis() as u64,
                    "job timed out; abandoning handler"
                );
                self.finish(
                    job_id,
                    Terminal::Failed {
                        error: "timeout".to_string(),
                        message: format!(
                            "job exceeded the {} ms execution timeout",
                            self.config.job_timeout.as_millis()
                        ),
                    },
                )
                .await;
            }
        }

        self.running.write().await.remove(&job_id);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Write the terminal state and emit the matching event. The event is
    /// published only after the store write commits, so clients never observe
    /// a later message with an earlier status.
    async fn finish(&self, job_id: Uuid, terminal: Terminal) {
        let mut job = match self.store.read(job_id).await {
            Ok(Some(job)) if !job.is_terminal() => job,
            Ok(_) => {
                warn!(job_id = %job_id, "job already terminal or missing; skipping write");
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to read job for terminal write");
                return;
            }
        };

        let now = Utc::now();
        job.completed = Some(now);
        job.updated = job.updated.max(now);

        let event = match terminal {
            Terminal::Completed(result) => {
                job.status = JobStatus::Completed;
                job.result = Some(result);
                job.progress = 100;
                JobEvent::Completed { job: job.clone() }
            }
            Terminal::Failed { error, message } => {
                job.status = JobStatus::Failed;
                job.error = Some(error);
                job.message = Some(message);
                JobEvent::Failed { job: job.clone() }
            }
        };

        match self.store.write(&job).await {
            Ok(true) => self.events.publish(event),
            Ok(false) => {
                warn!(job_id = %job_id, "job reached a terminal state concurrently; skipping write");
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to write terminal state");
            }
        }
    }

    /// Shutdown tail: signal every in-flight handler's token and wait
    /// (bounded) for them to finish or time out.
    async fn drain(&self) {
        let count = self.in_flight.load(Ordering::SeqCst);
        if count == 0 {
            return;
        }
        info!(count, "waiting for in-flight jobs to finish");

        for token in self.running.read().await.values() {
            token.cancel();
        }

        let deadline = Instant::now() + self.config.drain_timeout;
        while self.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let stranded = self.in_flight.load(Ordering::SeqCst);
        if stranded > 0 {
            warn!(count = stranded, "drain timeout elapsed with jobs still in flight");
        }
    }
}

enum Terminal {
    Completed(serde_json::Value),
    Failed { error: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::{InMemoryJobStore, JobRegistry};
    use serde_json::json;

    fn pool_with(registry: JobRegistry, config: WorkerPoolConfig) -> Arc<WorkerPool> {
        Arc::new(WorkerPool::with_config(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(registry),
            JobEventBus::new(),
            config,
        ))
    }

    #[test]
    fn config_defaults_match_reference_values() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.job_timeout, Duration::from_millis(300_000));
    }

    #[tokio::test]
    async fn submit_creates_a_pending_row() {
        let pool = pool_with(JobRegistry::new(), WorkerPoolConfig::default());
        let job = pool
            .submit(Job::pending("flyer-processing", json!({})))
            .await
            .unwrap();

        let stored = pool.store.read(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_a_noop() {
        let pool = pool_with(JobRegistry::new(), WorkerPoolConfig::default());
        pool.cancel(Uuid::new_v4()).await;
        assert_eq!(pool.in_flight(), 0);
    }

    /// Delegating store that can hold one non-terminal write open until
    /// released, to interleave a terminal write into the gap.
    struct GatedWriteStore {
        inner: InMemoryJobStore,
        release: tokio::sync::Semaphore,
        gate_next: std::sync::atomic::AtomicBool,
    }

    impl GatedWriteStore {
        fn new() -> Self {
            Self {
                inner: InMemoryJobStore::new(),
                release: tokio::sync::Semaphore::new(0),
                gate_next: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl BaseJobStore for GatedWriteStore {
        async fn read(&self, id: Uuid) -> Result<Option<Job>> {
            self.inner.read(id).await
        }

        async fn write(&self, job: &Job) -> Result<bool> {
            if !job.is_terminal() && self.gate_next.swap(false, Ordering::SeqCst) {
                self.release.acquire().await?.forget();
            }
            self.inner.write(job).await
        }

        async fn query_pending(&self) -> Result<Vec<Job>> {
            self.inner.query_pending().await
        }

        async fn count_processing(&self) -> Result<usize> {
            self.inner.count_processing().await
        }

        async fn prune_terminal_before(
            &self,
            cutoff: chrono::DateTime<Utc>,
        ) -> Result<u64> {
            self.inner.prune_terminal_before(cutoff).await
        }
    }

    #[tokio::test]
    async fn late_progress_write_cannot_resurrect_a_failed_job() {
        let store = Arc::new(GatedWriteStore::new());
        let job = Job::pending("flyer-processing", json!({}));
        store.inner.write(&job).await.unwrap();

        let ctx = JobContext::new(
            job.id,
            Arc::clone(&store) as Arc<dyn BaseJobStore>,
            JobEventBus::new(),
            CancellationToken::new(),
        );

        // The report reads a non-terminal row, then parks on its write
        store.gate_next.store(true, Ordering::SeqCst);
        let late = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.report_progress(50, "Still going").await })
        };
        tokio::task::yield_now().await;

        // Terminal write lands while the progress report is in flight
        let mut failed = store.inner.read(job.id).await.unwrap().unwrap();
        failed.status = JobStatus::Failed;
        failed.error = Some("timeout".to_string());
        failed.completed = Some(Utc::now());
        assert!(store.inner.write(&failed).await.unwrap());

        store.release.add_permits(1);
        late.await.unwrap().unwrap();

        let after = store.inner.read(job.id).await.unwrap().unwrap();
        assert_eq!(after.status, JobStatus::Failed);
        assert_eq!(after.error.as_deref(), Some("timeout"));
        assert!(after.completed.is_some());
        assert_eq!(after.progress, 0);
    }

    #[tokio::test]
    async fn progress_reports_are_monotonic_and_guarded() {
        let store: Arc<dyn BaseJobStore> = Arc::new(InMemoryJobStore::new());
        let events = JobEventBus::new();
        let job = Job::pending("flyer-processing", json!({}));
        store.write(&job).await.unwrap();

        let ctx = JobContext::new(
            job.id,
            Arc::clone(&store),
            events,
            CancellationToken::new(),
        );

        ctx.report_progress(60, "Extracting").await.unwrap();
        ctx.report_progress(20, "Re-reading").await.unwrap();

        let stored = store.read(job.id).await.unwrap().unwrap();
        // Progress never regresses; the step label still updates
        assert_eq!(stored.progress, 60);
        assert_eq!(stored.progress_step.as_deref(), Some("Re-reading"));

        // Terminal jobs reject late reports from abandoned handlers
        let mut terminal = stored.clone();
        terminal.status = JobStatus::Failed;
        store.write(&terminal).await.unwrap();

        ctx.report_progress(90, "Late write").await.unwrap();
        let after = store.read(job.id).await.unwrap().unwrap();
        assert_eq!(after.progress, 60);
        assert_eq!(after.progress_step.as_deref(), Some("Re-reading"));
    }
}
