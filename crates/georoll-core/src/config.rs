//! Application configuration management.
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`/etc/georoll/config.toml` in production)
//! 3. Environment variables prefixed with `GEOROLL__`, nested with `__`
//!    (e.g. `GEOROLL__CHECKIN__GRACE_PERIOD_MINUTES=10`)

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix and nesting separator.
const ENV_PREFIX: &str = "GEOROLL";
const ENV_SEPARATOR: &str = "__";

/// Longest grace period accepted before a check-in counts as late.
pub const MAX_GRACE_PERIOD_MINUTES: u32 = 240;

/// Errors raised while loading, validating or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ::config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// The configuration file could not be written.
    #[error("Failed to write {path}: {source}")]
    WriteError {
        /// Destination path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A single field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields hold invalid values.
    #[error("Configuration has {} invalid values", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// A specialized [`Result`] type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoRollConfig {
    /// Check-in evaluation settings.
    pub checkin: CheckInConfig,

    /// HTTP server settings.
    pub server: ServerConfig,

    /// Storage settings.
    pub storage: StorageConfig,
}

/// Check-in evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckInConfig {
    /// Minutes after a session's window start during which a check-in still
    /// counts as present. Later check-ins are recorded as late.
    pub grace_period_minutes: u32,

    /// Radius applied when an instructor does not declare one.
    pub default_radius_meters: f64,

    /// Largest radius an instructor may declare.
    pub max_radius_meters: f64,
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            grace_period_minutes: 15,
            default_radius_meters: 50.0,
            max_radius_meters: 1000.0,
        }
    }
}

impl CheckInConfig {
    /// The grace period as a duration.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::minutes(i64::from(self.grace_period_minutes))
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Use production logging (JSON files plus compact stdout).
    pub production: bool,

    /// Seconds between sweeps that close sessions past their window.
    pub sweep_interval_secs: u64,

    /// Directory for production log files. Falls back to the platform log
    /// directory when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            production: false,
            sweep_interval_secs: 30,
            log_dir: None,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for session and attendance files. Falls back to the
    /// platform data directory when unset.
    pub data_dir: Option<PathBuf>,

    /// Write sessions and attendance records to disk.
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            persist: true,
        }
    }
}

impl GeoRollConfig {
    /// Load configuration from defaults, an optional TOML file and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "Configuration loaded");
        Ok(config)
    }

    /// Save configuration as pretty-printed TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let write_error = |source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_error)?;
        Ok(())
    }

    /// Validate every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a single problem and
    /// [`ConfigError::MultipleValidationErrors`] for several.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut invalid = |field: &str, message: String| {
            errors.push(ConfigError::ValidationError {
                field: field.to_string(),
                message,
            });
        };

        let checkin = &self.checkin;
        if checkin.grace_period_minutes > MAX_GRACE_PERIOD_MINUTES {
            invalid(
                "checkin.grace_period_minutes",
                format!("must be at most {MAX_GRACE_PERIOD_MINUTES}"),
            );
        }
        if !checkin.max_radius_meters.is_finite() || checkin.max_radius_meters <= 0.0 {
            invalid(
                "checkin.max_radius_meters",
                "must be a positive number of meters".to_string(),
            );
        }
        if !checkin.default_radius_meters.is_finite() || checkin.default_radius_meters <= 0.0 {
            invalid(
                "checkin.default_radius_meters",
                "must be a positive number of meters".to_string(),
            );
        } else if checkin.default_radius_meters > checkin.max_radius_meters {
            invalid(
                "checkin.default_radius_meters",
                format!(
                    "must not exceed checkin.max_radius_meters ({})",
                    checkin.max_radius_meters
                ),
            );
        }

        if self.server.host.trim().is_empty() {
            invalid("server.host", "must not be empty".to_string());
        }
        if self.server.port == 0 {
            invalid("server.port", "must be non-zero".to_string());
        }
        if self.server.sweep_interval_secs == 0 {
            invalid("server.sweep_interval_secs", "must be non-zero".to_string());
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Default configuration file path.
    ///
    /// On Linux: `/etc/georoll/config.toml`.
    /// Elsewhere: the platform config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            PathBuf::from("/etc/georoll/config.toml")
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "georoll").map_or_else(
                || PathBuf::from("config.toml"),
                |dirs| dirs.config_dir().join("config.toml"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = GeoRollConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.checkin.grace_period_minutes, 15);
        assert!((config.checkin.default_radius_meters - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_grace_period_duration() {
        let checkin = CheckInConfig {
            grace_period_minutes: 10,
            ..CheckInConfig::default()
        };
        assert_eq!(checkin.grace_period(), Duration::minutes(10));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = GeoRollConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.checkin, CheckInConfig::default());
    }

    #[test]
    fn test_partial_file_overrides_only_given_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[checkin]\ngrace_period_minutes = 10\n\n[server]\nport = 8080\n",
        )
        .unwrap();

        let config = GeoRollConfig::load(&path).unwrap();
        assert_eq!(config.checkin.grace_period_minutes, 10);
        assert!((config.checkin.default_radius_meters - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = GeoRollConfig::default();
        config.checkin.max_radius_meters = 250.0;
        config.storage.data_dir = Some(dir.path().join("data"));
        config.save(&path).unwrap();

        let loaded = GeoRollConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[checkin]\ngrace_period_minutes = 9999\n").unwrap();

        let err = GeoRollConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. }
            if field == "checkin.grace_period_minutes"));
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let mut config = GeoRollConfig::default();
        config.checkin.default_radius_meters = 5000.0;
        config.server.port = 0;
        config.server.sweep_interval_secs = 0;

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_default_path_is_toml() {
        let path = GeoRollConfig::default_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
