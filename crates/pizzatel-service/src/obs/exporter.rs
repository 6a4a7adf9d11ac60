//! Periodic metrics exporter.
//!
//! One flush = snapshot the store, build the OTLP batch, POST it once.
//! Flushes never overlap: the scheduled loop awaits each flush before the next
//! tick, and a `flush_now` that finds a flush in progress returns `Skipped`.
//! Failures are logged and the batch dropped; the store is never reset, so the
//! next successful flush reports complete cumulative totals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use pizzatel_core::error::{Result, PizzatelError};
use pizzatel_core::wire::now_unix_nanos;
use pizzatel_core::wire::otlp::ExportMetricsRequest;

use crate::config::MetricsSection;
use crate::obs::batch::build_batch;
use crate::obs::push::{HttpPushTarget, PushTarget};
use crate::obs::store::MetricsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterState {
    Idle,
    Flushing,
}

/// Result of one flush attempt.
#[derive(Debug)]
pub enum FlushOutcome {
    /// No destination configured; nothing was built or sent.
    Disabled,
    /// Another flush was in progress.
    Skipped,
    /// Collector accepted the batch.
    Delivered { metrics: usize },
    /// Batch dropped; already logged.
    Failed(PizzatelError),
}

/// Shortest flush period accepted; matches the config lower bound.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

pub struct Exporter {
    store: Arc<MetricsStore>,
    source: String,
    interval: Duration,
    target: Option<Arc<dyn PushTarget>>,
    flushing: AtomicBool,
}

/// Clears the flushing flag however the flush ends.
struct FlushingGuard<'a>(&'a AtomicBool);

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Exporter {
    /// `interval` is raised to `MIN_FLUSH_INTERVAL` if shorter.
    pub fn new(
        store: Arc<MetricsStore>,
        source: impl Into<String>,
        interval: Duration,
        target: Option<Arc<dyn PushTarget>>,
    ) -> Self {
        Self {
            store,
            source: source.into(),
            interval: interval.max(MIN_FLUSH_INTERVAL),
            target,
            flushing: AtomicBool::new(false),
        }
    }

    /// Exporter for the configured destination; inert without `url`/`api_key`.
    pub fn from_config(store: Arc<MetricsStore>, cfg: &MetricsSection) -> Result<Self> {
        let target: Option<Arc<dyn PushTarget>> = match (cfg.endpoint(), cfg.credential()) {
            (Some(url), Some(credential)) => Some(Arc::new(HttpPushTarget::new(
                url,
                &credential,
                Duration::from_millis(cfg.push_timeout_ms),
            )?)),
            _ => None,
        };
        Ok(Self::new(
            store,
            cfg.source.clone(),
            Duration::from_millis(cfg.flush_interval_ms),
            target,
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> ExporterState {
        if self.flushing.load(Ordering::Acquire) {
            ExporterState::Flushing
        } else {
            ExporterState::Idle
        }
    }

    /// Run one flush cycle now.
    pub async fn flush_now(&self) -> FlushOutcome {
        let Some(target) = &self.target else {
            return FlushOutcome::Disabled;
        };

        if self
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("metrics flush already in progress, skipping");
            return FlushOutcome::Skipped;
        }
        let _guard = FlushingGuard(&self.flushing);

        let snapshot = self.store.snapshot();
        let load = self.store.sample_system_load();
        let metrics = build_batch(&snapshot, load, &self.source, now_unix_nanos());
        let count = metrics.len();

        let body = match serde_json::to_vec(&ExportMetricsRequest::single_scope(metrics)) {
            Ok(b) => Bytes::from(b),
            Err(e) => {
                tracing::warn!(error = %e, "error encoding metrics");
                return FlushOutcome::Failed(e.into());
            }
        };

        match target.post_json(body).await {
            Ok(()) => {
                tracing::debug!(metrics = count, "metrics pushed");
                FlushOutcome::Delivered { metrics: count }
            }
            Err(e) => {
                tracing::warn!(code = e.code().as_str(), error = %e, "error sending metrics");
                FlushOutcome::Failed(e)
            }
        }
    }

    /// Spawn the periodic flush loop. The first flush happens one interval
    /// after start.
    pub fn start(self: Arc<Self>) -> ExporterHandle {
        let (shutdown, mut rx) = watch::channel(false);

        if self.is_enabled() {
            tracing::info!(interval_ms = self.interval.as_millis() as u64, source = %self.source, "metrics exporter started");
        } else {
            tracing::info!("metrics export disabled: no url/api_key configured");
        }

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = self.flush_now().await;
                        tracing::trace!(?outcome, "metrics flush finished");
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("metrics exporter stopped");
        });

        ExporterHandle { shutdown, join }
    }
}

/// Running exporter loop.
pub struct ExporterHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ExporterHandle {
    /// Stop the loop and wait for it. An in-flight flush completes first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "metrics exporter task failed");
        }
    }
}
