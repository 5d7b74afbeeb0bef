// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the recognition pipeline and its configuration

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Recognition-related errors
    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Storage/filesystem errors (history export, runtime startup)
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// JSON output could not be produced
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the decoder adapter and the request queue
///
/// "No symbol found" is deliberately absent: an empty frame is a successful
/// recognition with an invalid result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// Null or empty pixel buffer, rejected before queueing
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// The external decoder failed or panicked
    #[error("decoder failure: {0}")]
    Decode(String),
    /// An image source could not be read
    #[error("cannot load {}: {message}", .path.display())]
    ImageLoad { path: PathBuf, message: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}
