//! Strong type definitions for the Grantbook core.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Row identifier of a grant record, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantId(pub i64);

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user in the external identity store.
///
/// Administrators are users too, so `granted_by` uses the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminator naming which kind of entity a grant targets.
///
/// Kinds are plain dotted names such as `"docs.section"`. The registry
/// never interprets them beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetKind(String);

impl TargetKind {
    /// Create a kind, rejecting empty or whitespace-padded names.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty() || name.trim() != name {
            return Err(CoreError::InvalidTargetKind(name));
        }
        Ok(Self(name))
    }

    /// The kind name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TargetKind {
    type Error = CoreError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<TargetKind> for String {
    fn from(kind: TargetKind) -> Self {
        kind.0
    }
}

impl FromStr for TargetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier of a target entity within its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub i64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Polymorphic reference to exactly one target entity.
///
/// Together with the user this forms the natural key of a grant. It is
/// fixed when the record is created and never rewritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: TargetId,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: TargetId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind_rejects_blank() {
        assert!(TargetKind::new("").is_err());
        assert!(TargetKind::new(" docs.section").is_err());
        assert!(TargetKind::new("docs.section").is_ok());
    }

    #[test]
    fn test_target_ref_display() {
        let target = TargetRef::new("docs.section".parse().unwrap(), TargetId(7));
        assert_eq!(target.to_string(), "docs.section#7");
    }

    #[test]
    fn test_target_kind_serde_is_transparent_string() {
        let kind = TargetKind::new("reports.board").unwrap();
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"reports.board\"");

        let bad: Result<TargetKind, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }
}
