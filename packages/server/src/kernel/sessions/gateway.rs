//! Broadcast gateway: job events in, session snapshots out.
//!
//! Subscribes to the [`JobEventBus`] and, for every change to a job, pushes a
//! `session_update` to each session tracking that job. Updates always carry
//! the full tracked-job snapshot read from the store, never a delta; the
//! worker pool publishes events only after its store write commits, so a
//! snapshot read here can never be older than the event that triggered it.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::ServerMessage;
use super::registry::SessionRegistry;
use crate::kernel::jobs::{Job, JobEvent, JobEventBus};
use crate::kernel::traits::BaseJobStore;

#[derive(Clone)]
pub struct BroadcastGateway {
    store: Arc<dyn BaseJobStore>,
    sessions: SessionRegistry,
    events: JobEventBus,
}

impl BroadcastGateway {
    pub fn new(
        store: Arc<dyn BaseJobStore>,
        sessions: SessionRegistry,
        events: JobEventBus,
    ) -> Self {
        Self {
            store,
            sessions,
            events,
        }
    }

    /// Consume job events until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("broadcast gateway starting");
        let mut rx = self.events.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(event) => self.fan_out(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        // A skipped event may have been a terminal one for a
                        // tracked job; refresh every session so none go stale
                        warn!(skipped, "gateway lagged behind job event bus; resyncing sessions");
                        self.resync_all().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!("broadcast gateway stopped");
    }

    async fn fan_out(&self, event: JobEvent) {
        let job_id = event.job().id;
        let sessions = self.sessions.sessions_tracking(job_id).await;
        if sessions.is_empty() {
            return;
        }
        debug!(job_id = %job_id, sessions = sessions.len(), "fanning out job update");

        for session_id in sessions {
            if let Err(e) = self.push_snapshot(session_id).await {
                error!(session_id = %session_id, error = %e, "failed to push snapshot");
            }
        }
    }

    /// Push a fresh snapshot to every live session. Recovers from dropped
    /// events, since snapshots carry full current state rather than deltas.
    pub async fn resync_all(&self) {
        for session_id in self.sessions.session_ids().await {
            if let Err(e) = self.push_snapshot(session_id).await {
                error!(session_id = %session_id, error = %e, "failed to resync session");
            }
        }
    }

    /// Build and broadcast the full snapshot for one session.
    pub async fn push_snapshot(&self, session_id: Uuid) -> Result<()> {
        let Some(jobs) = self.snapshot(session_id).await? else {
            return Ok(());
        };
        self.sessions
            .broadcast(session_id, &ServerMessage::SessionUpdate { session_id, jobs })
            .await;
        Ok(())
    }

    /// Read every job a session tracks, oldest first. `None` for unknown
    /// sessions. Tracked ids missing from the store are skipped.
    pub async fn snapshot(&self, session_id: Uuid) -> Result<Option<Vec<Job>>> {
        let Some(job_ids) = self.sessions.tracked_jobs(session_id).await else {
            return Ok(None);
        };

        let mut jobs = Vec::with_capacity(job_ids.len());
        for job_id in job_ids {
            if let Some(job) = self.store.read(job_id).await? {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(Some(jobs))
    }
}
