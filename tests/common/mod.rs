//! Common test utilities.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ...
//! }
//! ```
//!
//! Filter with `RUST_LOG`, e.g. `RUST_LOG=famradix=trace`.

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

/// Ensures the subscriber is only installed once across all tests.
static INIT: Once = Once::new();

/// Install a console tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
