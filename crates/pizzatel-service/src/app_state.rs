//! Shared application state for the pizza service.
//!
//! Owns the metrics store, exporter and log shipper for the life of the
//! process. Built once at startup and handed to the router; handlers reach the
//! store through this handle rather than through globals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pizzatel_core::error::Result;

use crate::config::ServiceConfig;
use crate::obs::{Exporter, LogShipper, MetricsStore};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    metrics: Arc<MetricsStore>,
    exporter: Arc<Exporter>,
    logger: Arc<LogShipper>,
}

struct AppStateInner {
    cfg: ServiceConfig,
    draining: AtomicBool,
}

impl AppState {
    /// Build application state from validated config.
    pub fn new(cfg: ServiceConfig) -> Result<Self> {
        Self::with_store(cfg, MetricsStore::shared())
    }

    /// Same as `new`, over a caller-provided store.
    pub fn with_store(cfg: ServiceConfig, metrics: Arc<MetricsStore>) -> Result<Self> {
        let exporter = Arc::new(Exporter::from_config(Arc::clone(&metrics), &cfg.metrics)?);
        let logger = Arc::new(LogShipper::from_config(&cfg.logging)?);

        if !logger.is_enabled() {
            tracing::info!("log shipping disabled: logging url/user_id/api_key not configured");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                draining: AtomicBool::new(false),
            }),
            metrics,
            exporter,
            logger,
        })
    }

    pub fn cfg(&self) -> &ServiceConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<MetricsStore> {
        Arc::clone(&self.metrics)
    }

    pub fn exporter(&self) -> Arc<Exporter> {
        Arc::clone(&self.exporter)
    }

    pub fn logger(&self) -> Arc<LogShipper> {
        Arc::clone(&self.logger)
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }
}
