//! Request lifecycle hooks installed on the router.
//!
//! - `track`: feeds the metrics store (counts on entry, latency on send).
//! - `http_log`: ships one `http` log line per request.

pub mod http_log;
pub mod track;

pub use http_log::log_requests;
pub use track::track_requests;
