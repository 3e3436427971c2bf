//! Job lifecycle events and the in-process bus that carries them.
//!
//! Every status or progress write to the Job Store is followed by one event on
//! the bus, carrying the full post-write snapshot. The broadcast gateway and
//! the notification dispatcher are the two subscribers; neither ever mutates
//! a job.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::Job;

/// A fact about the job lifecycle, emitted after the corresponding store write
/// has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    /// The scheduler claimed the job and marked it processing.
    Claimed { job: Job },

    /// A handler reported progress.
    Progress { job: Job },

    /// The job reached `completed`.
    Completed { job: Job },

    /// The job reached `failed` (handler error or timeout).
    Failed { job: Job },
}

impl JobEvent {
    /// The snapshot carried by this event.
    pub fn job(&self) -> &Job {
        match self {
            JobEvent::Claimed { job }
            | JobEvent::Progress { job }
            | JobEvent::Completed { job }
            | JobEvent::Failed { job } => job,
        }
    }

    /// Whether this event marks a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. } | JobEvent::Failed { .. })
    }
}

/// In-process broadcast bus for [`JobEvent`]s.
///
/// Thread-safe, cloneable. Publishing with no subscribers is a no-op.
#[derive(Clone)]
pub struct JobEventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl JobEventBus {
    /// Create a bus with the default capacity (256 buffered events).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Send errors (no active receivers) are ignored.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_job() -> Job {
        Job::pending("flyer-processing", json!({"creatorId": "user-1"}))
    }

    #[test]
    fn terminal_events_are_terminal() {
        assert!(JobEvent::Completed { job: sample_job() }.is_terminal());
        assert!(JobEvent::Failed { job: sample_job() }.is_terminal());
        assert!(!JobEvent::Claimed { job: sample_job() }.is_terminal());
        assert!(!JobEvent::Progress { job: sample_job() }.is_terminal());
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = JobEventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(JobEvent::Claimed { job: sample_job() });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.job().id, e2.job().id);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = JobEventBus::new();
        // Should not panic or error
        bus.publish(JobEvent::Progress { job: sample_job() });
    }
}
