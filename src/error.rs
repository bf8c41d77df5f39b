//! Error types for the background replacement pipeline

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MorphError>;

/// Error taxonomy shared by the catalog, removal client, compositor and pipeline
#[derive(Error, Debug)]
pub enum MorphError {
    /// The removal backend was unreachable or answered with a failure
    #[error("{0}")]
    RemoteService(String),

    /// The chosen background does not resolve to an existing file
    #[error("Background image not found: {}", .0.display())]
    BackgroundNotFound(PathBuf),

    /// Image decode, resize or encode failure
    #[error("Image composition failed: {0}")]
    Composition(String),

    /// Missing or malformed request input
    #[error("{0}")]
    Validation(String),

    /// The background directory could not be listed
    #[error("Failed to list backgrounds: {0}")]
    Catalog(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MorphError {
    /// Create a new remote service error
    pub fn remote_service<S: Into<String>>(msg: S) -> Self {
        Self::RemoteService(msg.into())
    }

    /// Create a new composition error
    pub fn composition<S: Into<String>>(msg: S) -> Self {
        Self::Composition(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a remote service error from a failed HTTP exchange
    pub fn upstream_status(status: u16, body: &str) -> Self {
        Self::RemoteService(format!(
            "Backend background removal failed: {} - {}",
            status, body
        ))
    }

    /// Create a catalog error with directory context
    pub fn catalog_error<P: AsRef<Path>>(dir: P, error: &std::io::Error) -> Self {
        Self::Catalog(format!("'{}': {}", dir.as_ref().display(), error))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (expected {})",
            parameter, value, valid_range
        ))
    }

    /// HTTP-equivalent status code used by the endpoint handlers
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            _ => 500,
        }
    }
}
