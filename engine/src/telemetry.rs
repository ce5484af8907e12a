//! Logging setup.
//!
//! One global `tracing` subscriber per process: pretty terminal output in
//! debug builds, JSON with span context in release. The filter comes from
//! `RUST_LOG` when set, otherwise from the configured log level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `log_level` drives both the default directive and the burrow crates;
/// an explicit `RUST_LOG` takes precedence over it. The subscriber can
/// only be installed once, so this runs after configuration is loaded —
/// otherwise `[core] log_level` would never take effect.
pub fn init_telemetry(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},burrow_engine={log_level}")));

    let registry = tracing_subscriber::registry().with(filter);

    #[cfg(debug_assertions)]
    registry
        .with(fmt::layer().pretty().with_target(false))
        .try_init()
        .ok();

    #[cfg(not(debug_assertions))]
    registry
        .with(fmt::layer().json().with_current_span(true))
        .try_init()
        .ok();
}
