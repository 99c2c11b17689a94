use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

/// Install the process-wide fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `LOG_LEVEL` (default `info`) is used as
/// the base directive. Calling this twice is harmless.
pub fn init() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(log_level.parse().unwrap_or(LevelFilter::INFO.into()))
    });

    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
