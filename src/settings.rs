//! Runtime settings for the fallback controller.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment overrides with the `MODEL_FALLBACK` prefix, and finally
//! whatever the command line sets. The backend ranking itself is a fixed table
//! and is deliberately not configurable here.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable prefix, e.g. `MODEL_FALLBACK__TIMEOUT_SECS=90`.
pub const ENV_PREFIX: &str = "MODEL_FALLBACK";

/// Separator for list values in the environment, e.g.
/// `MODEL_FALLBACK__ARGS=-y,some-cli`.
pub const ENV_LIST_SEPARATOR: &str = ",";

/// How the controller behaves once it escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Escalate and return a failed report.
    #[default]
    Auto,
    /// Present the report and let an operator request a restart.
    Supervised,
}

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file was not found.
    #[error("settings file not found: {0}")]
    FileNotFound(String),

    /// The settings path is not valid UTF-8.
    #[error("invalid settings path: {0}")]
    InvalidPath(String),

    /// The settings sources could not be parsed.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] ConfigError),

    /// A value is outside its allowed range.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Fallback controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    /// Inference CLI to invoke for each backend.
    pub command: String,
    /// Arguments placed before `--model`, for launchers such as `npx`.
    pub args: Vec<String>,
    /// Attempts on the same backend before rotating to the next one.
    pub max_retries_per_backend: u32,
    /// Full passes through the ranking before escalating.
    pub max_rotation_cycles: u32,
    /// Per-invocation timeout in seconds.
    pub timeout_secs: u64,
    /// Delay before retrying the same backend, in seconds.
    pub retry_backoff_secs: u64,
    /// Delay before moving to another backend or starting a new cycle, in seconds.
    pub rotate_backoff_secs: u64,
    /// Local hour (0-23) at which provider quotas are assumed to reset.
    pub reset_hour: u32,
    /// Behaviour on escalation.
    pub mode: RunMode,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            command: "gemini".to_string(),
            args: Vec::new(),
            max_retries_per_backend: 3,
            max_rotation_cycles: 3,
            timeout_secs: 60,
            retry_backoff_secs: 5,
            rotate_backoff_secs: 2,
            reset_hour: 0,
            mode: RunMode::Auto,
        }
    }
}

impl FallbackSettings {
    /// Loads settings from defaults, an optional TOML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unparsable, or if any value
    /// fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let path_str = path
                .to_str()
                .ok_or_else(|| SettingsError::InvalidPath(format!("{:?}", path)))?;
            if !path.exists() {
                return Err(SettingsError::FileNotFound(path_str.to_string()));
            }
            builder = builder.add_source(File::new(path_str, FileFormat::Toml));
        }

        let settings: FallbackSettings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(ENV_LIST_SEPARATOR)
                    .with_list_parse_key("args"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from a TOML string, without environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: FallbackSettings = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Checks every value is usable by the controller.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.command.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "command",
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_retries_per_backend == 0 {
            return Err(SettingsError::Invalid {
                field: "max_retries_per_backend",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_rotation_cycles == 0 {
            return Err(SettingsError::Invalid {
                field: "max_rotation_cycles",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.reset_hour >= 24 {
            return Err(SettingsError::Invalid {
                field: "reset_hour",
                reason: format!("{} is not an hour of the day", self.reset_hour),
            });
        }
        Ok(())
    }

    /// Per-invocation timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retrying the same backend.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    /// Delay before advancing to another backend or a new cycle.
    pub fn rotate_backoff(&self) -> Duration {
        Duration::from_secs(self.rotate_backoff_secs)
    }

    /// Sets the inference command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Sets the escalation mode.
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the per-invocation timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
