//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why a settings file could not be turned into [`crate::PulseSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read settings file {}: {source}", .path.display())]
    Io {
        /// Settings file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not JSON, or a value has the wrong shape once merged.
    #[error("settings file {} is not valid: {source}", .path.display())]
    Json {
        /// Settings file.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// A value the run cannot work with.
    #[error("invalid settings value: {key} {reason}")]
    InvalidValue {
        /// Dotted camelCase key, e.g. `details.batchSize`.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
