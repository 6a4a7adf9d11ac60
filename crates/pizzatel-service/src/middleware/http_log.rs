//! HTTP request logging middleware.
//!
//! When log shipping is enabled, request and response bodies with a known
//! length up to `CAPTURE_LIMIT` are buffered, attached to the `http` event as
//! `req`/`res` (redacted by the shipper), and handed on unchanged. Streaming or
//! larger bodies pass through untouched and are logged as `null`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{self, Body, Bytes, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::obs::logger::{HttpLogEvent, LogShipper};

const CAPTURE_LIMIT: usize = 64 * 1024;

pub async fn log_requests(
    State(logger): State<Arc<LogShipper>>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".into());
    let auth = req.headers().contains_key(AUTHORIZATION);
    let ip = client_ip(&req);

    if !logger.is_enabled() {
        let response = next.run(req).await;
        tracing::debug!(%method, %path, status = response.status().as_u16(), "request served");
        return response;
    }

    let (parts, req_body) = req.into_parts();
    let (req_body, req_json) = match capture(req_body).await {
        Ok(captured) => captured,
        Err(e) => {
            tracing::debug!(%method, %path, error = %e, "failed to read request body");
            return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
        }
    };

    let (parts, res_body) = next.run(Request::from_parts(parts, req_body)).await.into_parts();
    let (res_body, res_json) = match capture(res_body).await {
        Ok(captured) => captured,
        Err(e) => {
            tracing::warn!(%method, %path, error = %e, "failed to read response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let response = Response::from_parts(parts, res_body);

    let status = response.status().as_u16();
    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(%method, %path, status, duration_ms, "request served");

    logger.log_http(HttpLogEvent {
        auth,
        method,
        path,
        status,
        req: req_json,
        res: res_json,
        duration_ms,
        ip,
    });
    response
}

/// Buffer `body` when its exact length is known and small enough. Returns the
/// body to forward plus its logged form.
async fn capture(body: Body) -> Result<(Body, Value), axum::Error> {
    match body.size_hint().exact() {
        Some(len) if len as usize <= CAPTURE_LIMIT => {
            let bytes = body::to_bytes(body, CAPTURE_LIMIT).await?;
            let logged = body_value(&bytes);
            Ok((Body::from(bytes), logged))
        }
        _ => Ok((body, Value::Null)),
    }
}

/// JSON bodies as parsed values, anything else as text. Empty is `null`.
fn body_value(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// First `x-forwarded-for` hop, else the peer address when the server was
/// started with connect info.
fn client_ip(req: &Request) -> Option<String> {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}
