//! pizzatel service library entry.
//!
//! This crate wires the metrics store, the periodic OTLP exporter, the log
//! shipper and the HTTP hooks that feed them into an axum service. It is
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod middleware;
pub mod obs;
pub mod ops;
pub mod router;
