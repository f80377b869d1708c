//! Error types for the Grantbook core.

use thiserror::Error;

use crate::types::{TargetKind, TargetRef};

/// Errors raised while decoding core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid grant state: {0}")]
    InvalidState(String),

    #[error("invalid target kind: {0:?}")]
    InvalidTargetKind(String),
}

/// Failures of the target entity contract.
///
/// These never escape a write: the registry catches them where display
/// names are resolved and stores a placeholder instead.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The referenced entity no longer exists.
    #[error("target {0} no longer exists")]
    Missing(TargetRef),

    /// No resolver is registered for this kind.
    #[error("no resolver registered for target kind {0}")]
    UnknownKind(TargetKind),

    /// The entity exists but cannot produce the requested name.
    #[error("target name unavailable: {0}")]
    NameUnavailable(String),

    /// The resolver itself failed while looking the entity up.
    #[error("target lookup failed: {0}")]
    Lookup(String),
}
