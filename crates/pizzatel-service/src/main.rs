//! pizzatel service
//!
//! - Loads `pizzatel.yaml` (or `$PIZZATEL_CONFIG`)
//! - Starts the metrics exporter
//! - Serves `/healthz`, `/readyz`, `/metrics` behind the request hooks
//! - Ctrl-C: mark draining, finish in-flight requests, stop the exporter

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use pizzatel_core::error::{Result, PizzatelError};
use pizzatel_service::{app_state, config, router};

const DEFAULT_CONFIG_PATH: &str = "pizzatel.yaml";

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(code = e.code().as_str(), error = %e, "pizzatel-service failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("PIZZATEL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .service
        .listen
        .parse()
        .map_err(|e| PizzatelError::BadRequest(format!("service.listen: {e}")))?;

    let state = app_state::AppState::new(cfg)?;
    let exporter = state.exporter().start();
    let app = router::build_router(state.clone());

    tracing::info!(%listen, config = %path, "pizzatel-service starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| PizzatelError::Internal(format!("bind {listen} failed: {e}")))?;

    let draining = state.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl-c handler failed, running until killed");
                std::future::pending::<()>().await;
            }
            draining.set_draining();
            tracing::info!("draining");
        })
        .await
        .map_err(|e| PizzatelError::Internal(format!("server failed: {e}")))?;

    exporter.stop().await;
    Ok(())
}
