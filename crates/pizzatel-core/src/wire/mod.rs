//! Wire formats pushed to the collectors.
//!
//! - `otlp`: OTLP/JSON-shaped metric export documents.
//! - `loki`: Loki push documents carrying one JSON log line each.
//!
//! Both are plain serde structs; building them never fails, and encoding is a
//! single `serde_json::to_vec` at the push site.

pub mod loki;
pub mod otlp;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as nanoseconds since the Unix epoch.
///
/// A clock set before 1970 reports 0 rather than failing.
pub fn now_unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
