//! Observability side channels.
//!
//! - `store`: in-process counters, gauges and latency accumulators.
//! - `system`: CPU/memory sampling for the export batch.
//! - `batch` + `exporter`: periodic OTLP push of the store.
//! - `logger`: redacted structured log shipping.
//! - `push`: the HTTP transport both channels share.

pub mod batch;
pub mod exporter;
pub mod logger;
pub mod push;
pub mod store;
pub mod system;

pub use exporter::{Exporter, ExporterHandle, ExporterState, FlushOutcome};
pub use logger::{FactoryEvent, HttpLogEvent, LogShipper, ShipOutcome};
pub use store::{MetricsStore, RequestTimer, SessionDelta, StoreSnapshot};
pub use system::{SystemLoad, SystemSampler};
