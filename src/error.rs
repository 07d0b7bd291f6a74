//! Error types for groupwal
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for groupwal operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Record corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Log State Errors
    // -------------------------------------------------------------------------
    /// A previous write failed; the log no longer accepts commits.
    #[error("Log poisoned: {0}")]
    Poisoned(String),
}

impl WalError {
    /// True for errors caused by an earlier failed write rather than this call.
    pub fn is_poisoned(&self) -> bool {
        matches!(self, WalError::Poisoned(_))
    }
}
