//! Router and shared application state.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::kernel::jobs::WorkerPool;
use crate::kernel::sessions::{BroadcastGateway, SessionRegistry};
use crate::kernel::traits::BaseJobStore;

use super::routes;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BaseJobStore>,
    pub sessions: SessionRegistry,
    pub gateway: BroadcastGateway,
    pub worker: Arc<WorkerPool>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/ws", get(routes::ws::ws_handler))
        .route("/jobs", post(routes::jobs::create_job))
        .route("/jobs/:id", get(routes::jobs::get_job))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
