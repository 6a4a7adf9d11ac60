//! pizzatel core: wire formats, redaction, and the shared error surface.
//!
//! This crate defines the JSON documents pushed to the metrics and log
//! collectors, plus the error type shared by the service crate. It carries no
//! runtime or transport dependencies so the wire contracts can be tested in
//! isolation.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Observability code must never take the host process down, so every fallible
//! path surfaces as `PizzatelError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod redact;
pub mod wire;

/// Shared result type.
pub use error::{Result, PizzatelError};
