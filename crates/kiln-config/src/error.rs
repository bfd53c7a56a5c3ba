//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or reading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    Read {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required setting is absent.
    #[error("cannot find required setting at path '{0}'")]
    MissingSetting(String),

    /// A setting exists but has the wrong shape.
    #[error("invalid configuration value for {path}: {reason}")]
    InvalidValue {
        /// Dotted path of the setting.
        path: String,
        /// Explanation of why the value is invalid.
        reason: String,
    },

    /// The selected environment has no table in the settings file.
    #[error("unknown environment '{name}' (available: {available})")]
    UnknownEnvironment {
        /// The requested environment.
        name: String,
        /// Comma-separated environments the file defines.
        available: String,
    },

    /// A `$VAR` reference could not be substituted.
    #[error("cannot substitute setting {path}: {reason}")]
    Substitution {
        /// Dotted path of the setting, rooted at `$`.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The `.env` file could not be loaded.
    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Create a new missing setting error.
    pub fn missing_setting(path: impl Into<String>) -> Self {
        Self::MissingSetting(path.into())
    }

    /// Create a new invalid value error.
    pub fn invalid_value(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new substitution error.
    pub fn substitution(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Substitution {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
