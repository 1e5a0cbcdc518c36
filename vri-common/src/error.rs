//! Common error types for VRI

use thiserror::Error;

/// Common result type for VRI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across VRI services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored data could not be decoded, or a write gave up
    #[error("Internal error: {0}")]
    Internal(String),
}
