//! services/studio/src/error.rs
//!
//! Startup and serving failures of the studio binary. Request-level failures
//! never reach this type; handlers turn them into status codes.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The hosted-backend HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Binding or serving the listener failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing credentials and other startup checks.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
