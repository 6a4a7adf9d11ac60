//! Structured log shipping to a Loki-compatible push endpoint.
//!
//! Every event becomes one push with one line. Details are redacted before
//! encoding. Shipping is best-effort: missing config skips quietly, transport
//! errors are logged locally and dropped. The `log_*` helpers spawn the push
//! so request paths never wait on the collector.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use pizzatel_core::error::{Result, PizzatelError};
use pizzatel_core::redact::redacted;
use pizzatel_core::wire::loki::{LogLevel, LokiPush};

use crate::config::LoggingSection;
use crate::obs::push::{HttpPushTarget, PushTarget};

#[derive(Debug)]
pub enum ShipOutcome {
    Disabled,
    Shipped,
    Failed(PizzatelError),
}

/// One served HTTP request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpLogEvent {
    /// Whether the request carried an `Authorization` header.
    pub auth: bool,
    pub method: String,
    pub path: String,
    pub status: u16,
    /// Request body; `null` when empty or not captured.
    pub req: Value,
    /// Response body; `null` when empty or not captured.
    pub res: Value,
    pub duration_ms: u64,
    pub ip: Option<String>,
}

/// Calls to the pizza factory (the upstream that bakes orders).
#[derive(Debug, Clone)]
pub enum FactoryEvent {
    Request {
        url: String,
        body: Value,
    },
    Response {
        url: String,
        status: u16,
        ok: bool,
        body: Value,
        latency_ms: u64,
    },
}

impl FactoryEvent {
    fn kind(&self) -> &'static str {
        match self {
            FactoryEvent::Request { .. } => "factory_request",
            FactoryEvent::Response { .. } => "factory_response",
        }
    }

    fn details(self) -> Value {
        match self {
            FactoryEvent::Request { url, body } => json!({ "url": url, "req": body }),
            FactoryEvent::Response { url, status, ok, body, latency_ms } => json!({
                "url": url,
                "status": status,
                "ok": ok,
                "res": body,
                "latencyMs": latency_ms,
            }),
        }
    }
}

pub struct LogShipper {
    source: String,
    target: Option<Arc<dyn PushTarget>>,
}

impl LogShipper {
    pub fn new(source: impl Into<String>, target: Option<Arc<dyn PushTarget>>) -> Self {
        Self {
            source: source.into(),
            target,
        }
    }

    pub fn from_config(cfg: &LoggingSection) -> Result<Self> {
        let target: Option<Arc<dyn PushTarget>> = match (cfg.endpoint(), cfg.credential()) {
            (Some(url), Some(credential)) => Some(Arc::new(HttpPushTarget::new(
                url,
                &credential,
                Duration::from_millis(cfg.push_timeout_ms),
            )?)),
            _ => None,
        };
        Ok(Self::new(cfg.source.clone(), target))
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Build, redact and push one event.
    pub async fn send(&self, level: LogLevel, kind: &str, details: Value) -> ShipOutcome {
        let Some(target) = &self.target else {
            tracing::debug!(kind, "missing logging config, skipping send");
            return ShipOutcome::Disabled;
        };

        let body = LokiPush::single(&self.source, level, kind, redacted(&details), Utc::now())
            .and_then(|push| serde_json::to_vec(&push).map_err(PizzatelError::from));
        let body = match body {
            Ok(b) => Bytes::from(b),
            Err(e) => {
                tracing::warn!(kind, error = %e, "error encoding log line");
                return ShipOutcome::Failed(e);
            }
        };

        match target.post_json(body).await {
            Ok(()) => ShipOutcome::Shipped,
            Err(e) => {
                tracing::warn!(kind, code = e.code().as_str(), error = %e, "failed to ship log");
                ShipOutcome::Failed(e)
            }
        }
    }

    /// Fire-and-forget `send`. Dropped when called outside a tokio runtime.
    pub fn emit(self: &Arc<Self>, level: LogLevel, kind: &'static str, details: Value) {
        if !self.is_enabled() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(kind, "no runtime, dropping log event");
            return;
        };
        let shipper = Arc::clone(self);
        handle.spawn(async move {
            shipper.send(level, kind, details).await;
        });
    }

    pub fn log_http(self: &Arc<Self>, event: HttpLogEvent) {
        let details = serde_json::to_value(&event).unwrap_or(Value::Null);
        self.emit(LogLevel::Info, "http", details);
    }

    pub fn log_db(self: &Arc<Self>, query: &str, params: Value) {
        self.emit(LogLevel::Info, "db", json!({ "query": query, "params": params }));
    }

    pub fn log_factory(self: &Arc<Self>, event: FactoryEvent) {
        self.emit(LogLevel::Info, event.kind(), event.details());
    }

    /// Log an error with its source chain. `context` keys are merged in.
    pub fn log_error<E>(self: &Arc<Self>, err: &E, context: Value)
    where
        E: std::error::Error + 'static,
    {
        self.emit(LogLevel::Error, "error", error_details(err, context));
    }
}

pub fn error_details<E>(err: &E, context: Value) -> Value
where
    E: std::error::Error + 'static,
{
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(s) = source {
        causes.push(Value::String(s.to_string()));
        source = s.source();
    }

    let mut details = json!({
        "errorName": std::any::type_name::<E>(),
        "errorMessage": err.to_string(),
        "causes": causes,
    });
    if let (Value::Object(map), Value::Object(ctx)) = (&mut details, context) {
        map.extend(ctx);
    }
    details
}
