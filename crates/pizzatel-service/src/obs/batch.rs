//! Snapshot -> OTLP metric batch.
//!
//! Averages are derived here, at flush time: nothing averaged is stored.

use pizzatel_core::wire::otlp::{KeyValue, Metric, NumberValue};

use crate::obs::store::StoreSnapshot;
use crate::obs::system::SystemLoad;

fn attrs(source: &str, extra: &[(&str, &str)]) -> Vec<KeyValue> {
    extra
        .iter()
        .map(|(k, v)| KeyValue::string(*k, *v))
        .chain(std::iter::once(KeyValue::string("source", source)))
        .collect()
}

/// Build one flush worth of metrics, in emission order.
pub fn build_batch(snap: &StoreSnapshot, load: SystemLoad, source: &str, time_unix_nano: u64) -> Vec<Metric> {
    let int = NumberValue::AsInt;
    let double = NumberValue::AsDouble;
    let sum = |name: &str, unit: &str, v: NumberValue, extra: &[(&str, &str)]| {
        Metric::sum(name, unit, v, time_unix_nano, attrs(source, extra))
    };
    let gauge = |name: &str, unit: &str, v: NumberValue, extra: &[(&str, &str)]| {
        Metric::gauge(name, unit, v, time_unix_nano, attrs(source, extra))
    };

    let mut out = Vec::with_capacity(12 + snap.endpoint_latency.len());

    out.push(sum("http_requests_total", "1", int(snap.requests_total), &[]));
    for (method, count) in snap.requests_by_method {
        out.push(sum("http_requests_by_method_total", "1", int(count), &[("method", method)]));
    }

    out.push(gauge("active_users", "1", int(snap.active_users), &[]));
    out.push(sum("auth_attempts_success_total", "1", int(snap.auth_success), &[]));
    out.push(sum("auth_attempts_failure_total", "1", int(snap.auth_failure), &[]));

    out.push(gauge("cpu_usage_percent", "%", double(load.cpu_percent), &[]));
    out.push(gauge("memory_usage_percent", "%", double(load.memory_percent), &[]));

    let p = &snap.purchases;
    out.push(sum("pizza_sold_total", "1", int(p.sold), &[]));
    out.push(sum("pizza_creation_failures_total", "1", int(p.failures), &[]));
    out.push(sum("pizza_revenue_total", "USD", double(p.revenue), &[]));

    for (endpoint, acc) in &snap.endpoint_latency {
        out.push(gauge(
            "endpoint_latency_ms",
            "ms",
            double(acc.average()),
            &[("endpoint", endpoint.as_str())],
        ));
    }

    if p.latency.count > 0 {
        out.push(gauge("pizza_creation_latency_ms", "ms", double(p.latency.average()), &[]));
    }

    out
}
