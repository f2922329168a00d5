//! Configuration: defaults, overrides and validation.
//!
//! A [`Config`] is built once per server session. Callers either take
//! [`Config::default`] or layer a [`ConfigOverrides`] on top of it, usually
//! read from a JSON file:
//!
//! ```json
//! {
//!   "permission_mode": "ask",
//!   "additional_allowed_commands": [
//!     { "pattern": "cargo test", "description": "Run tests" }
//!   ],
//!   "allowed_directories": ["~/code", "/tmp"],
//!   "timeout_seconds": 60
//! }
//! ```
//!
//! `allowed_commands` / `blocked_commands` replace the built-in lists, while
//! `additional_allowed_commands` / `additional_blocked_commands` append to
//! whichever list is in effect.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::SandboxExecutor;
use crate::limits::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECONDS, ResourceLimits};
use crate::policy::{
    CommandPattern, PermissionMode, Policy, default_allowed_commands, default_blocked_commands,
};

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// Path of the config file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid JSON for [`ConfigOverrides`]
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        /// Path of the config file
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
    /// `timeout_seconds` was zero
    #[error("timeout_seconds must be positive")]
    ZeroTimeout,
    /// `max_output_bytes` was zero
    #[error("max_output_bytes must be positive")]
    ZeroOutputLimit,
}

/// Policy and sandbox settings for one server session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fallback for commands matching neither list
    pub permission_mode: PermissionMode,
    /// Allowed patterns, in evaluation order
    pub allowed_commands: Vec<CommandPattern>,
    /// Blocked patterns, in evaluation order
    pub blocked_commands: Vec<CommandPattern>,
    /// Roots that working directories must live under
    pub allowed_directories: Vec<PathBuf>,
    /// Wall-clock timeout per command
    pub timeout_seconds: u64,
    /// Cap on captured stdout + stderr
    pub max_output_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            permission_mode: PermissionMode::default(),
            allowed_commands: default_allowed_commands(),
            blocked_commands: default_blocked_commands(),
            allowed_directories: vec![crate::executor::home_dir()],
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Caller-supplied changes to the default [`Config`]. Every field is
/// optional; unset fields keep their default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    /// Replace the permission mode
    pub permission_mode: Option<PermissionMode>,
    /// Replace the allowed list
    pub allowed_commands: Option<Vec<CommandPattern>>,
    /// Replace the blocked list
    pub blocked_commands: Option<Vec<CommandPattern>>,
    /// Append to the allowed list
    pub additional_allowed_commands: Vec<CommandPattern>,
    /// Append to the blocked list
    pub additional_blocked_commands: Vec<CommandPattern>,
    /// Replace the permitted directory roots
    pub allowed_directories: Option<Vec<PathBuf>>,
    /// Replace the timeout
    pub timeout_seconds: Option<u64>,
    /// Replace the output cap
    pub max_output_bytes: Option<usize>,
}

impl Config {
    /// Defaults merged with `overrides`, validated.
    pub fn from_overrides(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let config = Self::default().merge(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Defaults merged with the [`ConfigOverrides`] stored as JSON at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let overrides: ConfigOverrides =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), "loaded config overrides");
        Self::from_overrides(overrides)
    }

    /// Apply `overrides` on top of this config.
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(mode) = overrides.permission_mode {
            self.permission_mode = mode;
        }
        if let Some(allowed) = overrides.allowed_commands {
            self.allowed_commands = allowed;
        }
        if let Some(blocked) = overrides.blocked_commands {
            self.blocked_commands = blocked;
        }
        self.allowed_commands
            .extend(overrides.additional_allowed_commands);
        self.blocked_commands
            .extend(overrides.additional_blocked_commands);
        if let Some(dirs) = overrides.allowed_directories {
            self.allowed_directories = dirs;
        }
        if let Some(timeout) = overrides.timeout_seconds {
            self.timeout_seconds = timeout;
        }
        if let Some(max) = overrides.max_output_bytes {
            self.max_output_bytes = max;
        }
        self
    }

    /// Check the limits are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_output_bytes == 0 {
            return Err(ConfigError::ZeroOutputLimit);
        }
        Ok(())
    }

    /// The execution limits this config describes.
    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            timeout: Duration::from_secs(self.timeout_seconds),
            max_output_bytes: self.max_output_bytes,
        }
    }

    /// Build the policy engine for this config.
    pub fn policy(&self) -> Policy {
        Policy::new(
            self.permission_mode,
            self.allowed_commands.clone(),
            self.blocked_commands.clone(),
        )
    }

    /// Build the sandboxed executor for this config.
    pub fn executor(&self) -> SandboxExecutor {
        SandboxExecutor::new(&self.allowed_directories, self.limits())
    }
}
