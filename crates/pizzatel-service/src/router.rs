//! Axum router wiring.
//!
//! Operational routes live at the root; application routes are mounted under
//! `/api`. Every request passes through the metrics and logging hooks.

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, middleware as hooks, ops};

pub fn build_router(state: AppState) -> Router {
    with_hooks(ops_routes(), state)
}

/// Router with `api` mounted under `/api`.
pub fn build_router_with(state: AppState, api: Router<AppState>) -> Router {
    with_hooks(ops_routes().nest("/api", api), state)
}

fn ops_routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
}

fn with_hooks(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(middleware::from_fn_with_state(state.logger(), hooks::log_requests))
        .layer(middleware::from_fn_with_state(state.metrics(), hooks::track_requests))
        .with_state(state)
}
