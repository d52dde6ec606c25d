//! Tracing bootstrap for binaries, demos, and tests.

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a formatted subscriber with `RUST_LOG`-style filtering.
///
/// Defaults to `warn,civicflow=info` when no filter is set in the
/// environment. Safe to call once per process; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,civicflow=info"))
        .unwrap_or_default();

    let fmt_layer = fmt::layer().with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init();
}
