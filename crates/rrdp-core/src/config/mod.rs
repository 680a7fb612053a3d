//! Configuration loading and validation.
//!
//! This module handles:
//! - The engine configuration file (`config.json`)
//! - Resolution order (CLI > env > XDG > defaults)
//! - Schema version checks
//! - Semantic validation with safe fallbacks (see [`validation`])

pub mod validation;

pub use validation::{sanitize, ConfigWarning};

use rrdp_format::ConsolidationFunction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// XDG config directory name.
const CONFIG_DIR_NAME: &str = "rrdp";

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG: &str = "RRDP_CONFIG";

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "RRDP_DATA_DIR";

/// Default cleanup delay in seconds.
pub const DEFAULT_CLEANUP_DELAY_SECS: u64 = 60;

/// Default cleanup poll interval in milliseconds.
pub const DEFAULT_CLEANUP_POLL_MS: u64 = 1000;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl From<ConfigError> for rrdp_common::Error {
    fn from(err: ConfigError) -> Self {
        rrdp_common::Error::Config(err.to_string())
    }
}

/// Delayed deletion of stores whose entity was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Off unless explicitly enabled.
    pub enabled: bool,
    /// Debounce delay between the last removal notice and deletion.
    pub delay_secs: u64,
    /// Upper bound on how long the cleanup thread sleeps between checks.
    pub poll_interval_ms: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_secs: DEFAULT_CLEANUP_DELAY_SECS,
            poll_interval_ms: DEFAULT_CLEANUP_POLL_MS,
        }
    }
}

impl CleanupConfig {
    pub fn enabled_with_delay(delay_secs: u64) -> Self {
        Self {
            enabled: true,
            delay_secs,
            ..Self::default()
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schema_version: String,
    /// Service root holding one store file per entity.
    pub data_dir: PathBuf,
    /// Consolidation function given to newly created stores.
    pub consolidation: ConsolidationFunction,
    pub cleanup: CleanupConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            data_dir: default_data_dir(),
            consolidation: ConsolidationFunction::Average,
            cleanup: CleanupConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_consolidation(mut self, consolidation: ConsolidationFunction) -> Self {
        self.consolidation = consolidation;
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// Default service root: `<data_local_dir>/rrdp/persistence/rrd`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rrdp")
        .join("persistence")
        .join("rrd")
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub config: EngineConfig,
    /// File the config came from (None if using defaults).
    pub config_path: Option<PathBuf>,
    /// SHA-256 of the file content (None if using defaults).
    pub config_hash: Option<String>,
    /// Fallbacks applied during validation.
    pub warnings: Vec<ConfigWarning>,
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
    /// Explicit data directory (overrides the file and env).
    pub data_dir: Option<PathBuf>,
}

/// Load configuration from the process environment.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI options
/// 2. Environment variables (`RRDP_CONFIG`, `RRDP_DATA_DIR`)
/// 3. XDG config home (`~/.config/rrdp/config.json`)
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    load_config_with(options, |key| std::env::var(key).ok())
}

/// Load configuration with an arbitrary environment lookup.
pub fn load_config_with<F>(options: &ConfigOptions, lookup: F) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut config, config_path, config_hash) = match resolve_config_file(options, &lookup) {
        FileChoice::Required(path) => {
            let (config, hash) = load_config_file(&path)?;
            (config, Some(path), Some(hash))
        }
        FileChoice::IfPresent(path) if path.exists() => {
            let (config, hash) = load_config_file(&path)?;
            (config, Some(path), Some(hash))
        }
        FileChoice::IfPresent(_) => (EngineConfig::default(), None, None),
    };

    if let Some(dir) = &options.data_dir {
        config.data_dir = dir.clone();
    } else if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.is_empty()) {
        config.data_dir = PathBuf::from(dir);
    }

    let (config, warnings) = sanitize(config);
    Ok(ResolvedConfig {
        config,
        config_path,
        config_hash,
        warnings,
    })
}

enum FileChoice {
    /// Named explicitly; must exist.
    Required(PathBuf),
    /// Conventional location; optional.
    IfPresent(PathBuf),
}

fn resolve_config_file<F>(options: &ConfigOptions, lookup: &F) -> FileChoice
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = &options.config_path {
        return FileChoice::Required(path.clone());
    }
    if let Some(path) = lookup(ENV_CONFIG).filter(|p| !p.is_empty()) {
        return FileChoice::Required(PathBuf::from(path));
    }
    let xdg_config = lookup("XDG_CONFIG_HOME")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
    FileChoice::IfPresent(xdg_config.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn load_config_file(path: &Path) -> Result<(EngineConfig, String), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::IoError {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let hash = hex::encode(Sha256::digest(content.as_bytes()));

    let config: EngineConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::VersionMismatch {
            expected: CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    Ok((config, hash))
}
