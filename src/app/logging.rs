//! Logging initialization.
//!
//! Uses the `tracing` ecosystem with either human-readable or JSON output on
//! stderr. `RUST_LOG` overrides the configured level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wdcaption::settings::LoggingSettings;

pub fn init(settings: &LoggingSettings, verbose: bool, json_logs: bool) {
    let level = if verbose { "debug" } else { settings.level.as_str() };
    // ort is chatty at info
    let directives = format!("{level},ort=warn");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    if json_logs || settings.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
