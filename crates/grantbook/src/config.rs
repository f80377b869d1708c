//! Registry configuration.

use std::path::Path;

use grantbook_core::{TARGET_PLACEHOLDER, USER_PLACEHOLDER};
use grantbook_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Strings stored or shown when a name cannot be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placeholders {
    /// Stored as capability and short name for unusable targets.
    pub target: String,
    /// Shown as full name for records without a known subject.
    pub user: String,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            target: TARGET_PLACEHOLDER.to_string(),
            user: USER_PLACEHOLDER.to_string(),
        }
    }
}

/// Configuration for the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub placeholders: Placeholders,
    /// Applied when the registry opens its own SQLite store.
    pub store: StoreConfig,
}

impl RegistryConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
