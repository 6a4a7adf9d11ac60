//! Shared fixtures: an in-process collector and a recording push target.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::Notify;

use pizzatel_core::error::Result;
use pizzatel_service::obs::push::PushTarget;

#[derive(Debug, Clone)]
pub struct Received {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
struct CollectorState {
    received: Arc<Mutex<Vec<Received>>>,
    status: Arc<AtomicU16>,
    delay_ms: Arc<AtomicU64>,
}

/// HTTP collector on an ephemeral port. Answers every POST to `/push` with
/// the configured status.
pub struct Collector {
    pub url: String,
    state: CollectorState,
}

impl Collector {
    pub async fn spawn() -> Self {
        let state = CollectorState::default();
        state.status.store(200, Ordering::SeqCst);

        let app = Router::new()
            .route("/push", post(collect))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/push"),
            state,
        }
    }

    pub fn respond_with(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }

    pub fn delay(&self, d: Duration) {
        self.state.delay_ms.store(d.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }
}

async fn collect(State(s): State<CollectorState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let delay = s.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let get = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    s.received.lock().unwrap().push(Received {
        authorization: get(header::AUTHORIZATION),
        content_type: get(header::CONTENT_TYPE),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    StatusCode::from_u16(s.status.load(Ordering::SeqCst)).unwrap()
}

/// In-memory target. Optionally parks each push until `release` is notified.
#[derive(Default)]
pub struct RecordingTarget {
    pub bodies: Mutex<Vec<Value>>,
    pub pushed: Notify,
    pub entered: Notify,
    pub release: Option<Notify>,
}

impl RecordingTarget {
    pub fn gated() -> Self {
        Self {
            release: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Value> {
        self.bodies.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PushTarget for RecordingTarget {
    async fn post_json(&self, body: Bytes) -> Result<()> {
        self.entered.notify_one();
        if let Some(release) = &self.release {
            release.notified().await;
        }
        self.bodies
            .lock()
            .unwrap()
            .push(serde_json::from_slice(&body).unwrap());
        self.pushed.notify_one();
        Ok(())
    }
}

/// Find a metric by name (and optional attribute) in an export body.
pub fn metric<'a>(body: &'a Value, name: &str, attr: Option<(&str, &str)>) -> Option<&'a Value> {
    body["resourceMetrics"][0]["scopeMetrics"][0]["metrics"]
        .as_array()?
        .iter()
        .find(|m| {
            m["name"] == name
                && attr.map_or(true, |(k, v)| {
                    let dp = m.get("sum").or_else(|| m.get("gauge")).unwrap();
                    dp["dataPoints"][0]["attributes"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .any(|kv| kv["key"] == k && kv["value"]["stringValue"] == v)
                })
        })
}

/// Numeric value of a metric's single data point.
pub fn value(metric: &Value) -> f64 {
    let dp = &metric.get("sum").or_else(|| metric.get("gauge")).unwrap()["dataPoints"][0];
    dp.get("asInt")
        .or_else(|| dp.get("asDouble"))
        .and_then(Value::as_f64)
        .unwrap()
}
