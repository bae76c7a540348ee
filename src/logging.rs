use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Diagnostics go to stderr so they never tear the status line on stdout.
/// With `log_dir`, a daily rotated JSON file is written as well.
pub fn init_logging(log_dir: Option<&Path>) {
    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(rolling::daily(dir, "upping.log"))
            .with_ansi(false)
            .json()
    });

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    // Default to `warn` if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}
