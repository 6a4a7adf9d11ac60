//! Process-wide metric state.
//!
//! `MetricsStore` owns every counter, gauge and latency accumulator for the
//! life of the process. It is shared as `Arc<MetricsStore>` and mutated only
//! through the `record_*` methods below, which never fail and never wait on
//! I/O. Scalar counters are atomics; endpoint accumulators live in a `DashMap`
//! (per-entry locking); the purchase tally sits behind one short mutex so
//! sold/failed/revenue/latency are always read together.
//!
//! Values are cumulative since process start and are never reset by export.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

use crate::obs::system::{SystemLoad, SystemSampler};

/// Methods with their own `http_requests_by_method_total` series.
/// Anything else (PATCH, HEAD, ...) only counts toward the total.
pub const TRACKED_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// Running sum and count of observed durations (milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyAccumulator {
    pub sum_ms: f64,
    pub count: u64,
}

impl LatencyAccumulator {
    fn observe(&mut self, ms: f64) {
        self.sum_ms += ms;
        self.count += 1;
    }

    /// Mean duration; a zero count is treated as one.
    pub fn average(&self) -> f64 {
        self.sum_ms / self.count.max(1) as f64
    }
}

/// Active-session gauge adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDelta {
    /// A user logged in (+1).
    Started,
    /// A user logged out (-1, floored at zero).
    Ended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PurchaseTally {
    pub sold: u64,
    pub failures: u64,
    pub revenue: f64,
    pub latency: LatencyAccumulator,
}

/// Point-in-time copy of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub requests_total: u64,
    pub requests_by_method: [(&'static str, u64); 4],
    pub active_users: u64,
    pub auth_success: u64,
    pub auth_failure: u64,
    pub purchases: PurchaseTally,
    /// Keyed by `[METHOD] path`, sorted for stable output.
    pub endpoint_latency: BTreeMap<String, LatencyAccumulator>,
}

impl StoreSnapshot {
    pub fn requests_for(&self, method: &str) -> Option<u64> {
        self.requests_by_method
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, n)| *n)
    }
}

/// In-flight request, returned by [`MetricsStore::record_request`].
#[derive(Debug)]
pub struct RequestTimer {
    method: String,
    path: String,
    started: Instant,
}

impl RequestTimer {
    pub fn endpoint(&self) -> String {
        endpoint_key(&self.method, &self.path)
    }

    /// Record the elapsed time since `record_request`.
    pub fn finish(self, store: &MetricsStore) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        store.record_request_finished(&self.method, &self.path, elapsed_ms);
    }
}

/// Endpoint identifier: `[GET] /api/order`.
pub fn endpoint_key(method: &str, path: &str) -> String {
    let path = if path.is_empty() { "/" } else { path };
    format!("[{}] {}", method.to_ascii_uppercase(), path)
}

pub struct MetricsStore {
    requests_total: AtomicU64,
    requests_by_method: [AtomicU64; 4],
    endpoint_latency: DashMap<String, LatencyAccumulator>,
    active_users: AtomicU64,
    auth_success: AtomicU64,
    auth_failure: AtomicU64,
    purchases: Mutex<PurchaseTally>,
    sampler: SystemSampler,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore {
    /// Store sampling the local host through `/proc`.
    pub fn new() -> Self {
        Self::with_sampler(SystemSampler::detect())
    }

    pub fn with_sampler(sampler: SystemSampler) -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_by_method: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
            endpoint_latency: DashMap::new(),
            active_users: AtomicU64::new(0),
            auth_success: AtomicU64::new(0),
            auth_failure: AtomicU64::new(0),
            purchases: Mutex::new(PurchaseTally::default()),
            sampler,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Count a request and start its latency timer.
    pub fn record_request(&self, method: &str, path: &str) -> RequestTimer {
        let method = method.to_ascii_uppercase();

        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if let Some(i) = TRACKED_METHODS.iter().position(|m| *m == method) {
            self.requests_by_method[i].fetch_add(1, Ordering::Relaxed);
        }

        RequestTimer {
            method,
            path: path.to_string(),
            started: Instant::now(),
        }
    }

    /// Add one completed request to its endpoint's latency accumulator.
    ///
    /// Call once per request, after the response has been fully sent.
    ///
    /// Keys are raw paths, so `/api/franchise/3` and `/api/franchise/4` are
    /// separate series. Entries are never evicted; callers with unbounded
    /// path parameters should pass a route template instead.
    pub fn record_request_finished(&self, method: &str, path: &str, elapsed_ms: f64) {
        if !elapsed_ms.is_finite() || elapsed_ms < 0.0 {
            tracing::trace!(method, path, elapsed_ms, "ignoring invalid request latency");
            return;
        }
        self.endpoint_latency
            .entry(endpoint_key(method, path))
            .or_default()
            .observe(elapsed_ms);
    }

    pub fn record_auth(&self, success: bool) {
        let counter = if success { &self.auth_success } else { &self.auth_failure };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_user_session_delta(&self, delta: SessionDelta) {
        match delta {
            SessionDelta::Started => {
                self.active_users.fetch_add(1, Ordering::Relaxed);
            }
            SessionDelta::Ended => {
                // Already zero: nothing to end.
                let _ = self
                    .active_users
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
            }
        }
    }

    /// Record a pizza order outcome.
    ///
    /// A missing, negative or non-finite `price` adds nothing to revenue, so the
    /// revenue sum never decreases. A missing, negative or non-finite
    /// `elapsed_ms` is not sampled. Latency is sampled for failures too.
    pub fn record_purchase(&self, success: bool, elapsed_ms: Option<f64>, price: Option<f64>) {
        let mut tally = self.purchases();
        if success {
            tally.sold += 1;
            tally.revenue += price.filter(|p| p.is_finite() && *p >= 0.0).unwrap_or(0.0);
        } else {
            tally.failures += 1;
        }

        if let Some(ms) = elapsed_ms.filter(|ms| ms.is_finite() && *ms >= 0.0) {
            tally.latency.observe(ms);
        }
    }

    /// Current CPU and memory utilization; computed, not stored.
    pub fn sample_system_load(&self) -> SystemLoad {
        self.sampler.sample()
    }

    /// Copy every value out of the store.
    pub fn snapshot(&self) -> StoreSnapshot {
        let by_method = |i: usize| {
            (
                TRACKED_METHODS[i],
                self.requests_by_method[i].load(Ordering::Relaxed),
            )
        };
        let purchases = *self.purchases();

        StoreSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_by_method: [by_method(0), by_method(1), by_method(2), by_method(3)],
            active_users: self.active_users.load(Ordering::Relaxed),
            auth_success: self.auth_success.load(Ordering::Relaxed),
            auth_failure: self.auth_failure.load(Ordering::Relaxed),
            purchases,
            endpoint_latency: self
                .endpoint_latency
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }

    fn purchases(&self) -> MutexGuard<'_, PurchaseTally> {
        // The tally is plain data; a panic elsewhere cannot leave it torn.
        self.purchases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
