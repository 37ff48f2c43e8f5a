//! Logging and tracing configuration
//!
//! Wire traffic is logged at debug/trace level, so `RUST_LOG=roku_debugger=trace`
//! shows every byte exchanged with the device.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize tracing for the CLI (stdout logging)
///
/// Precedence: `RUST_LOG` environment variable, then the config file's
/// filter directive, then the built-in default.
pub fn init(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            config_filter
                .map(EnvFilter::try_new)
                .unwrap_or_else(|| EnvFilter::try_new("roku_debugger=info,warn"))
        })
        .unwrap_or_else(|_| EnvFilter::new("roku_debugger=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
