//! Job registry mapping job type strings to handlers.
//!
//! Each domain registers its job types at startup. When the worker pool
//! claims a job, it looks up the handler here and invokes it with a
//! [`JobContext`] for progress reporting and cooperative cancellation.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = JobRegistry::new();
//! registry.register(FLYER_PROCESSING, move |job, ctx| {
//!     let extraction = extraction.clone();
//!     async move { process_flyer(job, ctx, extraction).await }
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::worker::JobContext;
use super::Job;

/// Shared, immutable registry handed to the worker pool after startup.
pub type SharedJobRegistry = Arc<JobRegistry>;

/// Handlers return the job's `result` payload on success.
type BoxedHandler = Box<
    dyn Fn(Job, JobContext) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<String, BoxedHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job type. Re-registering replaces the old
    /// handler.
    pub fn register<F, Fut>(&mut self, job_type: &str, handler: F)
    where
        F: Fn(Job, JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        self.handlers.insert(
            job_type.to_string(),
            Box::new(move |job, ctx| Box::pin(handler(job, ctx))),
        );
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn job_types(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Execute the handler registered for `job.job_type`.
    pub async fn execute(&self, job: Job, ctx: JobContext) -> Result<serde_json::Value> {
        let handler = self
            .handlers
            .get(&job.job_type)
            .ok_or_else(|| anyhow!("no handler registered for job type '{}'", job.job_type))?;

        handler(job, ctx).await
    }
}
