mod detector_tests;
mod geometry_tests;
pub(crate) mod support;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a tracing subscriber once for the whole test binary; RUST_LOG
/// overrides the default level.
pub(crate) fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
