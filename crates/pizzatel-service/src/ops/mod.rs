//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/readyz`  : readiness (503 when draining)
//! - `/metrics` : JSON view of the metrics store plus a live system sample

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::app_state::AppState;
use crate::obs::{ExporterState, StoreSnapshot, SystemLoad};

#[derive(Serialize)]
struct MetricsView {
    #[serde(flatten)]
    snapshot: StoreSnapshot,
    system: SystemLoad,
    export_enabled: bool,
    exporter: ExporterState,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.metrics();
    let exporter = state.exporter();

    Json(MetricsView {
        snapshot: store.snapshot(),
        system: store.sample_system_load(),
        export_enabled: exporter.is_enabled(),
        exporter: exporter.state(),
    })
}
