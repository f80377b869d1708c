//! Error types for the registry.

use grantbook_store::StoreError;
use thiserror::Error;

/// Errors that can occur during registry operations.
///
/// Only persistence and configuration problems are errors. Unusable
/// targets degrade to placeholder names and transitions that match no
/// record are no-ops.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
