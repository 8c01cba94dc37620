//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Base level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Installs a compact stderr subscriber filtered by `RUST_LOG` (falling back
/// to `level`).
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_tracing(level: &str) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt_layer)
        .try_init();
}
