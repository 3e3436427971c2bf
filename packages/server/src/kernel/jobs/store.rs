//! In-memory job store.
//!
//! Backs tests and single-process deployments where `DATABASE_URL` is unset.
//! The store contract makes no demand on the engine beyond atomic whole-row
//! writes, so a `RwLock<HashMap>` qualifies.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Job, JobStatus};
use crate::kernel::traits::BaseJobStore;

pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of stored jobs (test helper).
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseJobStore for InMemoryJobStore {
    async fn read(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn write(&self, job: &Job) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        // Checked under the same write lock that applies the upsert, so a
        // concurrent terminal write cannot slip into the gap
        if let Some(existing) = jobs.get(&job.id) {
            if existing.is_terminal() {
                return Ok(false);
            }
        }
        jobs.insert(job.id, job.clone());
        Ok(true)
    }

    async fn query_pending(&self) -> Result<Vec<Job>> {
        let mut pending: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        // FIFO admission: oldest first, id as tiebreaker for stable order
        pending.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn count_processing(&self) -> Result<usize> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .count())
    }

    async fn prune_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, j| !(j.is_terminal() && j.updated < cutoff));
        Ok((before - jobs.len()) as u64)
    }
}
