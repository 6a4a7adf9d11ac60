//! Request tracking middleware (metrics).
//!
//! Counts the request on entry. Latency is recorded when the response body is
//! dropped, i.e. once hyper has written the last byte (or the client went
//! away), so it covers the full send rather than just the handler. The body is
//! wrapped, not re-streamed, so its size hint and framing reach hyper intact.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http_body::{Frame, SizeHint};

use crate::obs::store::{MetricsStore, RequestTimer};

/// Records the request exactly once, on drop.
struct FinishOnDrop {
    store: Arc<MetricsStore>,
    timer: Option<RequestTimer>,
}

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.finish(&self.store);
        }
    }
}

/// Response body carrying the request's `FinishOnDrop`.
struct TrackedBody {
    inner: Body,
    _guard: FinishOnDrop,
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

pub async fn track_requests(
    State(store): State<Arc<MetricsStore>>,
    req: Request,
    next: Next,
) -> Response {
    let timer = store.record_request(req.method().as_str(), req.uri().path());
    let guard = FinishOnDrop {
        store,
        timer: Some(timer),
    };

    let (parts, inner) = next.run(req).await.into_parts();
    let body = TrackedBody {
        inner,
        _guard: guard,
    };
    Response::from_parts(parts, Body::new(body))
}
