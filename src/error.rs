// src/error.rs

use thiserror::Error;

/// Core error types for Quartermaster
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine session initialization error
    #[error("Failed to initialize engine session: {0}")]
    InitError(String),

    /// Configuration file unreadable or malformed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Repository metadata fetch or package download failure
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Downloaded artifact digest did not match repository metadata
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Malformed input (timestamps, glob patterns, metadata fields)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Named entity does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),
}

/// Result type alias using Quartermaster's Error type
pub type Result<T> = std::result::Result<T, Error>;
