//! Notification dispatcher: terminal job events → push notifications.
//!
//! Listens on the job event bus and, for each `completed` or `failed` job
//! with a creator, sends one push message. Dispatch is strictly best-effort:
//! lookup failures, missing tokens and delivery errors are logged and
//! swallowed. A notification problem must never disturb the job pipeline.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{completion_message, failure_message, MessageContent};
use super::outcomes::parse_outcome;
use crate::kernel::jobs::{Job, JobEvent, JobEventBus, JobStatus};
use crate::kernel::traits::{BasePushNotificationService, BaseUserLookup, PushMessage};

#[derive(Clone)]
pub struct NotificationDispatcher {
    users: Arc<dyn BaseUserLookup>,
    push: Arc<dyn BasePushNotificationService>,
    events: JobEventBus,
}

impl NotificationDispatcher {
    pub fn new(
        users: Arc<dyn BaseUserLookup>,
        push: Arc<dyn BasePushNotificationService>,
        events: JobEventBus,
    ) -> Self {
        Self {
            users,
            push,
            events,
        }
    }

    /// Consume terminal job events until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("notification dispatcher starting");
        let mut rx = self.events.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(event) if event.is_terminal() => {
                        if let Err(e) = self.dispatch(event.job()).await {
                            warn!(job_id = %event.job().id, error = %e,
                                "notification dispatch failed");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "dispatcher lagged behind job event bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!("notification dispatcher stopped");
    }

    /// Send the notification for one terminal job, if it warrants one.
    pub async fn dispatch(&self, job: &Job) -> Result<()> {
        let Some(creator_id) = job.creator_id() else {
            debug!(job_id = %job.id, "job has no creator; skipping notification");
            return Ok(());
        };

        let Some(content) = self.content_for(job) else {
            debug!(job_id = %job.id, job_type = %job.job_type,
                "no notification mapping for job type");
            return Ok(());
        };

        let Some(recipient) = self.users.find_by_id(creator_id).await? else {
            warn!(job_id = %job.id, creator_id, "creator not found; skipping notification");
            return Ok(());
        };

        let message = PushMessage {
            title: content.title,
            body: content.body,
            data: self.data_payload(job),
            priority: content.priority,
        };

        let receipt = self.push.send_to_user(&recipient, &message).await?;
        info!(
            job_id = %job.id,
            creator_id,
            success = receipt.success,
            failed = receipt.failed,
            "notification sent"
        );
        Ok(())
    }

    fn content_for(&self, job: &Job) -> Option<MessageContent> {
        match job.status {
            JobStatus::Completed => {
                let result = job.result.clone().unwrap_or(serde_json::Value::Null);
                let outcome = parse_outcome(&job.job_type, &result)?;
                Some(completion_message(&outcome))
            }
            JobStatus::Failed => failure_message(&job.job_type),
            // Non-terminal events never reach dispatch, but stay safe anyway
            JobStatus::Pending | JobStatus::Processing => None,
        }
    }

    /// Opaque payload the client uses for deep-linking from the tap.
    fn data_payload(&self, job: &Job) -> serde_json::Value {
        let kind = match job.status {
            JobStatus::Completed => "job_completed",
            _ => "job_failed",
        };
        json!({
            "type": kind,
            "jobId": job.id,
            "jobType": job.job_type,
            "result": job.result,
            "error": job.error,
            "timestamp": Utc::now(),
        })
    }
}
