use std::collections::BTreeMap;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use maple_core::JobKind;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Connected sessions.
    pub sessions: usize,
    /// Jobs waiting for a credential.
    pub queued: usize,
    /// Credentials with a job running.
    pub in_flight: usize,
    pub queued_by_kind: BTreeMap<JobKind, usize>,
}

/// GET /health -- returns service status and scheduler load.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let scheduler = state.broker.scheduler();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.broker.sessions().session_count().await,
        queued: scheduler.queued(),
        in_flight: scheduler.in_flight(),
        queued_by_kind: scheduler.depth_by_kind(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
