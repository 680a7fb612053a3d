//! Semantic validation of loaded configuration.
//!
//! Out-of-range values never abort startup: each one is replaced by its
//! default and reported as a [`ConfigWarning`].

use super::{EngineConfig, DEFAULT_CLEANUP_DELAY_SECS, DEFAULT_CLEANUP_POLL_MS};
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// A value that was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub field: String,
    pub rejected: String,
    pub fallback: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} is not usable, using {}",
            self.field, self.rejected, self.fallback
        )
    }
}

/// Replace unusable values with defaults.
pub fn sanitize(mut config: EngineConfig) -> (EngineConfig, Vec<ConfigWarning>) {
    let mut warnings = Vec::new();

    if config.cleanup.delay_secs == 0 {
        warnings.push(fallback(
            "cleanup.delay_secs",
            config.cleanup.delay_secs,
            DEFAULT_CLEANUP_DELAY_SECS,
        ));
        config.cleanup.delay_secs = DEFAULT_CLEANUP_DELAY_SECS;
    }
    if config.cleanup.poll_interval_ms == 0 {
        warnings.push(fallback(
            "cleanup.poll_interval_ms",
            config.cleanup.poll_interval_ms,
            DEFAULT_CLEANUP_POLL_MS,
        ));
        config.cleanup.poll_interval_ms = DEFAULT_CLEANUP_POLL_MS;
    }
    if config.data_dir.as_os_str().is_empty() {
        let default = super::default_data_dir();
        warnings.push(ConfigWarning {
            field: "data_dir".to_string(),
            rejected: "\"\"".to_string(),
            fallback: default.display().to_string(),
        });
        config.data_dir = default;
    }

    for warning in &warnings {
        warn!(
            field = %warning.field,
            rejected = %warning.rejected,
            fallback = %warning.fallback,
            "invalid configuration value replaced"
        );
    }

    (config, warnings)
}

fn fallback(field: &str, rejected: u64, default: u64) -> ConfigWarning {
    ConfigWarning {
        field: field.to_string(),
        rejected: rejected.to_string(),
        fallback: default.to_string(),
    }
}
