//! Job submission over plain HTTP.
//!
//! Clients create jobs here, then track them through the WebSocket gateway
//! with `add_job`. Submission only writes the `pending` row; the worker pool
//! picks it up on its next poll.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use crate::kernel::jobs::Job;
use crate::kernel::traits::BaseJobStore;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub data: Value,
}

pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), (StatusCode, Json<Value>)> {
    let job = Job::pending(&request.job_type, request.data);
    match state.worker.submit(job).await {
        Ok(job) => Ok((StatusCode::CREATED, Json(job))),
        Err(e) => {
            error!(error = %e, "job submission failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to submit job" })),
            ))
        }
    }
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, (StatusCode, Json<Value>)> {
    match state.store.read(id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "job not found" })),
        )),
        Err(e) => {
            error!(job_id = %id, error = %e, "job read failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to read job" })),
            ))
        }
    }
}
