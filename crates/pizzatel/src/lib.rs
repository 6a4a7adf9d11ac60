//! Top-level facade crate for pizzatel.
//!
//! Re-exports the wire/error core and the service library so users can depend
//! on a single crate.

pub mod core {
    pub use pizzatel_core::*;
}

pub mod service {
    pub use pizzatel_service::*;
}
