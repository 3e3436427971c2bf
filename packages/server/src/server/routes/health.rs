use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::kernel::traits::BaseJobStore;
use crate::server::app::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    // Store may be unreachable; report 0 rather than failing the check
    let processing = state.store.count_processing().await.unwrap_or_default();
    Json(json!({
        "status": "ok",
        "inFlightJobs": state.worker.in_flight(),
        "processingJobs": processing,
        "sessions": state.sessions.session_count().await,
    }))
}
