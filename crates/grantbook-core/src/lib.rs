//! # Grantbook Core
//!
//! Pure data model for the Grantbook authorization-grant registry.
//!
//! This crate contains no I/O and no storage. It describes what a grant is,
//! which states it may be in, and the contracts that target entities and
//! subjects must satisfy to take part in the registry.
//!
//! ## Key Types
//!
//! - [`GrantRecord`] - One (user, target, capability) grant with its lifecycle
//! - [`GrantState`] - ACTIVE, PENDING or REVOKED
//! - [`GrantFlags`] - The legacy (approved, waiting, old_right) projection of a state
//! - [`TargetRef`] - Polymorphic reference: target kind discriminator plus id
//! - [`GrantTarget`] - Contract every grantable entity implements
//! - [`TargetRegistry`] - Per-kind map from discriminator to resolver
//! - [`UserDirectory`] - Contract for the external identity store
//!
//! ## State Model
//!
//! | State   | approved | waiting | old_right |
//! |---------|----------|---------|-----------|
//! | Active  | true     | false   | false     |
//! | Pending | false    | true    | ignored   |
//! | Revoked | false    | false   | true      |

pub mod error;
pub mod record;
pub mod state;
pub mod subject;
pub mod target;
pub mod types;

pub use error::{CoreError, TargetError};
pub use record::{
    ActiveGrant, DisplayNames, GrantRecord, NewGrant, PendingGrant, RevokedGrant,
    UserTargetGrant, TARGET_PLACEHOLDER, USER_PLACEHOLDER,
};
pub use state::{GrantFlags, GrantState};
pub use subject::UserDirectory;
pub use target::{GrantTarget, TargetRegistry, TargetResolver};
pub use types::{GrantId, TargetId, TargetKind, TargetRef, UserId};
