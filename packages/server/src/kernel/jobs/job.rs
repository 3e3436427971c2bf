//! Job model for asynchronous extraction work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a job.
///
/// The transition order is total: `pending → processing → (completed | failed)`.
/// `completed` and `failed` are terminal; no other edges exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is on the allowed path.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => anyhow::bail!("unknown job status: {other}"),
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Per-phase progress for multi-step handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDetails {
    pub current_step: u32,
    pub total_steps: u32,
    /// Progress within the current step, 0-100.
    pub step_progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_description: Option<String>,
}

// ============================================================================
// Job
// ============================================================================

/// A unit of asynchronous work with a typed payload, progress, and a terminal
/// result or error.
///
/// The Job Store is the single source of truth for jobs; the worker pool owns
/// every mutation. Session and notification code only ever read snapshots.
///
/// Serializes to the camelCase wire form pushed to clients in
/// `session_update` envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    /// Open-ended type tag (e.g. "flyer-processing"). New types may be added
    /// without touching this model.
    #[serde(rename = "type")]
    pub job_type: String,

    #[builder(default)]
    pub status: JobStatus,

    // Timestamps (ISO-8601 on the wire)
    #[builder(default = Utc::now())]
    pub created: DateTime<Utc>,
    /// Monotonic non-decreasing; refreshed on every write.
    #[builder(default = Utc::now())]
    pub updated: DateTime<Utc>,
    /// Set only on reaching a terminal state.
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,

    // Progress (0-100, monotonic non-decreasing while processing)
    #[builder(default = 0)]
    pub progress: u8,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_step: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_details: Option<ProgressDetails>,

    /// Handler input payload. Includes `creatorId` when the job belongs to a
    /// user; its absence marks a system-internal job (e.g. periodic-cleanup).
    #[builder(default = serde_json::Value::Null)]
    pub data: serde_json::Value,

    /// Handler output payload; shape depends on `job_type`.
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Short failure code (e.g. "timeout").
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable failure or completion explanation.
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Convenience pointer into the events collaborator.
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
}

impl Job {
    /// Create a pending job with a payload (convenience constructor).
    pub fn pending(job_type: &str, data: serde_json::Value) -> Self {
        Self::builder().job_type(job_type).data(data).build()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The owning user, read from `data.creatorId`. `None` is a valid,
    /// intentional state for system-internal jobs.
    pub fn creator_id(&self) -> Option<&str> {
        self.data.get("creatorId").and_then(|v| v.as_str())
    }

    /// Refresh `updated`, keeping it monotonic non-decreasing.
    pub fn touch(&mut self) {
        self.updated = self.updated.max(Utc::now());
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
    fn new_job_starts_pending_with_zero_progress() {
        let job = sample_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.completed.is_none());
    }

    #[test]
    fn creator_id_reads_from_data() {
        assert_eq!(sample_job().creator_id(), Some("user-1"));

        let system = Job::pending("periodic-cleanup", json!({}));
        assert_eq!(system.creator_id(), None);
    }

    #[test]
    fn status_transition_order_is_total() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn job_serializes_to_camel_case_wire_form() {
        let mut job = sample_job();
        job.progress_step = Some("Reading flyer".to_string());
        job.progress_details = Some(ProgressDetails {
            current_step: 1,
            total_steps: 3,
            step_progress: 40,
            step_description: None,
        });

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "flyer-processing");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["progressStep"], "Reading flyer");
        assert_eq!(json["progressDetails"]["currentStep"], 1);
        assert_eq!(json["data"]["creatorId"], "user-1");
        // Unset terminal fields stay off the wire
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn touch_never_moves_updated_backwards() {
        let mut job = sample_job();
        let future = Utc::now() + chrono::Duration::hours(1);
        job.updated = future;
        job.touch();
        assert_eq!(job.updated, future);
    }
}
