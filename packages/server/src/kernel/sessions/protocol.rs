//! Wire protocol for the WebSocket gateway.
//!
//! Every frame is a JSON envelope with a `type` discriminator. Client
//! commands come in, server messages fan out; both sides use camelCase
//! field names to match the mobile client.
//!
//! A connection holds at most one active session, established by
//! `create_session` or `join_session`; the job commands operate on that
//! implicit session.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::kernel::jobs::Job;

/// Commands a client may send over an open connection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Open a fresh session and attach this connection to it.
    CreateSession,
    /// Attach this connection to a session. Unknown ids are not an error;
    /// the session simply starts empty. Re-joining is idempotent.
    #[serde(rename_all = "camelCase")]
    JoinSession { session_id: Uuid },
    /// Track a job in the active session so its updates fan out here.
    #[serde(rename_all = "camelCase")]
    AddJob { job_id: Uuid },
    /// Request cooperative cancellation of a job. Best-effort; a no-op for
    /// terminal or unknown jobs.
    #[serde(rename_all = "camelCase")]
    CancelJob { job_id: Uuid },
    /// Stop tracking every job in the active session. The jobs themselves
    /// keep running; only the tracking set empties.
    ClearSession,
}

/// Messages the server sends to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    SessionCreated { session_id: Uuid },
    /// Reply to `join_session`; followed immediately by a `session_update`
    /// carrying the full snapshot.
    #[serde(rename_all = "camelCase")]
    SessionJoined { session_id: Uuid },
    /// Fan-out on every tracked-job change. Always the complete tracked set,
    /// never a diff.
    #[serde(rename_all = "camelCase")]
    SessionUpdate { session_id: Uuid, jobs: Vec<Job> },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no active session; send create_session or join_session first")]
    NoActiveSession,
}

impl ClientCommand {
    /// Parse one inbound text frame.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}
