//! Shared test utilities.
//!
//! `init_tracing` installs a fmt subscriber once per process so stress runs
//! can be traced:
//!
//! ```bash
//! RUST_LOG=litdict=debug cargo test --features tracing --test stress_tests
//! ```

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber. Safe to call from every test; only the
/// first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
