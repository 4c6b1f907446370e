//! Error types for the drift pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Result type for drift operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Drift pipeline errors
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("unsupported format for {path}: .{extension}")]
    UnsupportedFormat { path: String, extension: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("persistence failure at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest at {path} is unreadable: {reason}")]
    CorruptManifest { path: PathBuf, reason: String },

    #[error("version {version} already exists in the registry")]
    AlreadyExists { version: String },

    #[error("version {version} not found in the registry")]
    NotFound { version: String },

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("registry lock held at {path}; another validation run is in progress")]
    LockHeld { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("semver error: {0}")]
    Semver(#[from] semver::Error),
}
