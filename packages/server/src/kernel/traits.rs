// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (progress phases, notification wording) lives in the
// domain and notification modules that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseJobStore)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::jobs::Job;

// =============================================================================
// Job Store Trait (Infrastructure - durable record per job)
// =============================================================================

/// Durable storage for jobs.
///
/// `write` is an atomic whole-row upsert; the worker pool is the only writer.
/// Implementations: [`InMemoryJobStore`](crate::kernel::jobs::InMemoryJobStore)
/// and [`PostgresJobStore`](crate::kernel::jobs::PostgresJobStore).
#[async_trait]
pub trait BaseJobStore: Send + Sync {
    /// Read a job by id. `None` when the id is unknown.
    async fn read(&self, id: Uuid) -> Result<Option<Job>>;

    /// Upsert the full job row. Terminal rows are immutable: a write against
    /// an existing `completed`/`failed` row is refused atomically and returns
    /// `false`. This is what stops a late report from an abandoned handler
    /// from resurrecting a finished job, so it must hold under the store's
    /// own lock or statement, not a caller-side read-then-write.
    async fn write(&self, job: &Job) -> Result<bool>;

    /// All `pending` jobs, oldest first (FIFO admission order).
    async fn query_pending(&self) -> Result<Vec<Job>>;

    /// Number of jobs currently in `processing`. Surfaced on `/health`.
    async fn count_processing(&self) -> Result<usize>;

    /// Delete terminal jobs last updated before `cutoff`. Returns the number
    /// of rows removed. Used by the periodic-cleanup job.
    async fn prune_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

// =============================================================================
// User Lookup Trait (Infrastructure - push recipient resolution)
// =============================================================================

/// A push-addressable user resolved from a job's `creatorId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    /// Expo push token; `None` when the user never registered a device.
    pub push_token: Option<String>,
}

#[async_trait]
pub trait BaseUserLookup: Send + Sync {
    /// Resolve a user id to a recipient. `None` when no such user exists.
    async fn find_by_id(&self, user_id: &str) -> Result<Option<Recipient>>;
}

// =============================================================================
// Push Notification Trait (Infrastructure)
// =============================================================================

/// Delivery urgency; failures go out `High`, completions `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    #[default]
    Normal,
    High,
}

/// A user-facing push message with its opaque data payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub priority: NotificationPriority,
}

/// Per-delivery success/failure counts reported by the push collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReceipt {
    pub success: u32,
    pub failed: u32,
}

#[async_trait]
pub trait BasePushNotificationService: Send + Sync {
    /// Deliver a push message to all of a user's registered devices.
    async fn send_to_user(
        &self,
        recipient: &Recipient,
        message: &PushMessage,
    ) -> Result<DeliveryReceipt>;
}

// =============================================================================
// Extraction Trait (Infrastructure - opaque per-job-type pipeline)
// =============================================================================

/// The extraction pipeline behind the per-type job handlers.
///
/// The pipeline's content (OCR/LLM calls) is an external collaborator; the
/// scheduler only sees payload in, result JSON out.
#[async_trait]
pub trait BaseExtractionService: Send + Sync {
    /// Run extraction for one job. `job_type` selects the pipeline variant;
    /// the returned value becomes the job's `result`.
    async fn extract(
        &self,
        job_type: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value>;
}
