//! Shared error and result types for stacks-vault.
//!
//! `VaultError` covers infrastructure-level failures (config, auth, IO).
//! Expected cryptographic failures use `cipher::DecryptError` instead, because
//! a failed decrypt is a normal, frequent outcome that callers must branch on,
//! not an exceptional condition.

use thiserror::Error;

/// Top-level error type for the gateway.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Authentication failure (missing/invalid bearer token, bad demo headers)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO failure (socket bind, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VaultError>;
