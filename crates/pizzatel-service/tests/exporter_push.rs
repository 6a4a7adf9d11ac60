//! Exporter end-to-end: store -> batch -> HTTP push -> collector.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use pizzatel_core::wire::otlp::ExportMetricsRequest;
use pizzatel_service::config;
use pizzatel_service::obs::push::{HttpPushTarget, PushTarget};
use pizzatel_service::obs::exporter::MIN_FLUSH_INTERVAL;
use pizzatel_service::obs::{Exporter, ExporterState, FlushOutcome, MetricsStore, SystemSampler};

mod common;
use common::{metric, value, Collector, RecordingTarget};

fn quiet_store() -> Arc<MetricsStore> {
    Arc::new(MetricsStore::with_sampler(SystemSampler::unavailable()))
}

fn exporter_to(store: Arc<MetricsStore>, url: &str, credential: &str) -> Exporter {
    let target: Arc<dyn PushTarget> =
        Arc::new(HttpPushTarget::new(url, credential, Duration::from_secs(2)).unwrap());
    Exporter::new(store, "pizza-test", Duration::from_secs(10), Some(target))
}

#[tokio::test]
async fn delivers_one_otlp_document_with_basic_auth() {
    let collector = Collector::spawn().await;
    let store = quiet_store();

    let _ = store.record_request("GET", "/api/menu");
    store.record_request_finished("GET", "/api/menu", 42.0);

    let exporter = exporter_to(Arc::clone(&store), &collector.url, "123456:glc_abc");
    let outcome = exporter.flush_now().await;
    assert!(matches!(outcome, FlushOutcome::Delivered { metrics: 14 }), "{outcome:?}");

    let received = collector.received();
    assert_eq!(received.len(), 1);
    let req = &received[0];
    assert_eq!(req.authorization.as_deref(), Some("Basic MTIzNDU2OmdsY19hYmM="));
    assert_eq!(req.content_type.as_deref(), Some("application/json"));

    let doc: ExportMetricsRequest = serde_json::from_value(req.body.clone()).unwrap();
    assert_eq!(doc.resource_metrics.len(), 1);
    assert!(doc
        .metrics()
        .all(|m| m.data_point().unwrap().attribute("source") == Some("pizza-test")));

    let latency = metric(&req.body, "endpoint_latency_ms", Some(("endpoint", "[GET] /api/menu")))
        .expect("endpoint latency gauge");
    assert_eq!(value(latency), 42.0);
    assert!(latency.get("gauge").is_some());

    let total = metric(&req.body, "http_requests_total", None).unwrap();
    assert_eq!(value(total), 1.0);
    assert_eq!(total["sum"]["isMonotonic"], true);
    assert_eq!(
        total["sum"]["aggregationTemporality"],
        "AGGREGATION_TEMPORALITY_CUMULATIVE"
    );
    let get = metric(&req.body, "http_requests_by_method_total", Some(("method", "GET"))).unwrap();
    assert_eq!(value(get), 1.0);
}

#[tokio::test]
async fn no_destination_means_no_network_calls() {
    let collector = Collector::spawn().await;

    // url present, api_key missing
    let yaml = format!("version: 1\nmetrics:\n  url: \"{}\"\n", collector.url);
    let cfg = config::load_from_str(&yaml).unwrap();
    let exporter = Exporter::from_config(quiet_store(), &cfg.metrics).unwrap();
    assert!(!exporter.is_enabled());
    assert!(matches!(exporter.flush_now().await, FlushOutcome::Disabled));

    // nothing configured at all
    let cfg = config::load_from_str("version: 1\n").unwrap();
    let exporter = Exporter::from_config(quiet_store(), &cfg.metrics).unwrap();
    assert!(matches!(exporter.flush_now().await, FlushOutcome::Disabled));

    assert!(collector.received().is_empty());
}

#[tokio::test]
async fn failed_push_does_not_lose_cumulative_totals() {
    let collector = Collector::spawn().await;
    let store = quiet_store();
    let exporter = exporter_to(Arc::clone(&store), &collector.url, "k");

    store.record_purchase(true, Some(120.0), Some(9.99));
    store.record_auth(true);

    collector.respond_with(500);
    match exporter.flush_now().await {
        FlushOutcome::Failed(e) => assert_eq!(e.code().as_str(), "STATUS"),
        other => panic!("expected failure, got {other:?}"),
    }

    store.record_purchase(false, None, None);
    store.record_auth(false);

    collector.respond_with(200);
    assert!(matches!(exporter.flush_now().await, FlushOutcome::Delivered { .. }));

    let received = collector.received();
    assert_eq!(received.len(), 2);
    let body = &received[1].body;
    assert_eq!(value(metric(body, "pizza_sold_total", None).unwrap()), 1.0);
    assert_eq!(value(metric(body, "pizza_creation_failures_total", None).unwrap()), 1.0);
    assert!((value(metric(body, "pizza_revenue_total", None).unwrap()) - 9.99).abs() < 1e-9);
    assert_eq!(value(metric(body, "pizza_creation_latency_ms", None).unwrap()), 120.0);
    assert_eq!(value(metric(body, "auth_attempts_success_total", None).unwrap()), 1.0);
    assert_eq!(value(metric(body, "auth_attempts_failure_total", None).unwrap()), 1.0);
}

#[tokio::test]
async fn unreachable_collector_is_a_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let exporter = exporter_to(quiet_store(), &format!("http://{addr}/push"), "k");
    match exporter.flush_now().await {
        FlushOutcome::Failed(e) => assert_eq!(e.code().as_str(), "TRANSPORT"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(exporter.state(), ExporterState::Idle);
}

#[tokio::test]
async fn slow_collector_hits_push_timeout() {
    let collector = Collector::spawn().await;
    collector.delay(Duration::from_secs(3));

    let target: Arc<dyn PushTarget> =
        Arc::new(HttpPushTarget::new(&collector.url, "k", Duration::from_millis(200)).unwrap());
    let exporter = Exporter::new(quiet_store(), "pizza-test", Duration::from_secs(10), Some(target));

    match exporter.flush_now().await {
        FlushOutcome::Failed(e) => assert_eq!(e.code().as_str(), "TRANSPORT"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn overlapping_flush_is_skipped() {
    let target = Arc::new(RecordingTarget::gated());
    let exporter = Arc::new(Exporter::new(
        quiet_store(),
        "pizza-test",
        Duration::from_secs(10),
        Some(Arc::clone(&target) as Arc<dyn PushTarget>),
    ));

    let first = tokio::spawn({
        let exporter = Arc::clone(&exporter);
        async move { exporter.flush_now().await }
    });
    target.entered.notified().await;

    assert_eq!(exporter.state(), ExporterState::Flushing);
    assert!(matches!(exporter.flush_now().await, FlushOutcome::Skipped));

    target.release.as_ref().unwrap().notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, FlushOutcome::Delivered { .. }));
    assert_eq!(exporter.state(), ExporterState::Idle);
    assert_eq!(target.count(), 1);
}

#[tokio::test]
async fn scheduled_loop_pushes_until_stopped() {
    let target = Arc::new(RecordingTarget::default());
    let store = quiet_store();
    store.record_request("POST", "/api/order");

    let exporter = Arc::new(Exporter::new(
        Arc::clone(&store),
        "pizza-test",
        Duration::from_millis(100),
        Some(Arc::clone(&target) as Arc<dyn PushTarget>),
    ));
    let handle = Arc::clone(&exporter).start();

    tokio::time::timeout(Duration::from_secs(5), target.pushed.notified())
        .await
        .expect("no scheduled flush");
    handle.stop().await;

    let pushed = target.count();
    assert!(pushed >= 1);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(target.count(), pushed, "flushes after stop");

    let body = target.last().unwrap();
    let post = metric(&body, "http_requests_by_method_total", Some(("method", "POST"))).unwrap();
    assert_eq!(value(post), 1.0);
}

#[tokio::test]
async fn zero_interval_is_clamped_and_loop_still_runs() {
    let target = Arc::new(RecordingTarget::default());
    let exporter = Arc::new(Exporter::new(
        quiet_store(),
        "pizza-test",
        Duration::ZERO,
        Some(Arc::clone(&target) as Arc<dyn PushTarget>),
    ));
    assert_eq!(exporter.interval(), MIN_FLUSH_INTERVAL);

    let handle = Arc::clone(&exporter).start();
    tokio::time::timeout(Duration::from_secs(5), target.pushed.notified())
        .await
        .expect("no scheduled flush");
    handle.stop().await;
    assert!(target.count() >= 1);
}
