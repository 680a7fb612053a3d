//! Structured logging for rrdp.
//!
//! Two output modes, both on stderr:
//! - human-readable console output for interactive use
//! - JSONL for scripts and log shippers
//!
//! stdout is reserved for command payloads.

pub mod config;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events pass the default filter.
const CRATE_TARGETS: [&str; 4] = ["rrdp_core", "rrdp_format", "rrdp_bundle", "rrdp"];

/// Filter directive for `level` across all rrdp crates.
pub fn default_directives(level: LogLevel) -> String {
    CRATE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber.
///
/// Call once at startup. A second call (or a subscriber installed by a test
/// harness) is left in place.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_new(default_directives(config.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
