//! Test-only helpers shared by every crate in the workspace: a tracing
//! subscriber for test output and fixed wire-format fixtures used by
//! generator and round-trip tests.

use std::sync::Once;

pub mod vectors;

static INIT: Once = Once::new();

/// Installs a tracing subscriber for test output. Safe to call from every
/// test; only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub mod prelude {
    pub use super::init;
}
