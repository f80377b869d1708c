//! # Grantbook
//!
//! A registry of authorization grants: per user and per arbitrary target
//! entity, whether access is granted, awaiting approval, or revoked.
//!
//! ## Overview
//!
//! - **Grant**: a (user, target, capability) record with one lifecycle state
//! - **Request**: a user asks for access; the record becomes pending
//! - **Approve**: an administrator grants access; the record becomes active
//! - **Revoke**: access is withdrawn; the record stays, marked revoked
//! - **Delete**: the rare hard removal of every record of a (user, target) pair
//!
//! ## Key Concepts
//!
//! - **Target**: any entity implementing [`GrantTarget`]; the registry only
//!   stores its kind discriminator and id, plus display names recomputed on
//!   every write.
//! - **Placeholders**: a target that cannot name itself never blocks a
//!   write; a fixed placeholder is stored instead.
//! - **Soft revoke**: revoked records remain queryable as history.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use grantbook::{GrantRegistry, RegistryConfig};
//! use grantbook::core::{TargetRegistry, UserId};
//! use grantbook::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("grants.db").unwrap();
//!     let registry = GrantRegistry::new(store, TargetRegistry::new(), RegistryConfig::default());
//!
//!     // let outcome = registry.request(UserId(7), &section).await.unwrap();
//!     // registry.approve(outcome.record().id, UserId(1)).await.unwrap();
//!
//!     let active = registry.active_for_user(UserId(7)).await.unwrap();
//!     println!("{} active grants", active.len());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `grantbook::core` - Data model (GrantRecord, GrantState, TargetRef, etc.)
//! - `grantbook::store` - Storage abstraction and SQLite

pub mod admin;
pub mod config;
pub mod error;
mod names;
pub mod registry;

// Re-export component crates
pub use grantbook_core as core;
pub use grantbook_store as store;

// Re-export main types for convenience
pub use admin::{GrantListQuery, GrantListRow};
pub use config::{Placeholders, RegistryConfig};
pub use error::{RegistryError, Result};
pub use registry::{GrantRegistry, RequestOutcome};

// Re-export commonly used core types
pub use grantbook_core::{
    ActiveGrant, DisplayNames, GrantFlags, GrantId, GrantRecord, GrantState, GrantTarget,
    PendingGrant, RevokedGrant, TargetError, TargetId, TargetKind, TargetRef, TargetRegistry,
    TargetResolver, UserDirectory, UserId, UserTargetGrant,
};
