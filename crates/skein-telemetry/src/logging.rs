//! Subscriber setup for the `tracing` output the sinks rely on.

use tracing_subscriber::{fmt, EnvFilter};

/// Output format for [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines for terminals.
    Pretty,
    /// One JSON object per line, suitable for log shippers.
    Json,
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies (e.g.
/// "info", "skein_telemetry=debug,warn"). Safe to call multiple times
/// (e.g. in tests) -- subsequent calls are no-ops.
pub fn init(service_name: &str, default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .try_init()
                .ok();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .try_init()
                .ok();
        }
    }

    tracing::info!(service = service_name, ?format, "telemetry logging initialised");
}

/// Human-readable output.
pub fn init_logging(service_name: &str, default_level: &str) {
    init(service_name, default_level, LogFormat::Pretty);
}

/// JSON output for structured pipelines.
pub fn init_logging_json(service_name: &str, default_level: &str) {
    init(service_name, default_level, LogFormat::Json);
}
