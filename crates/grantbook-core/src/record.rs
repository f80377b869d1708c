//! Grant records and their per-state projections.

use serde::{Deserialize, Serialize};

use crate::state::{GrantFlags, GrantState};
use crate::subject::UserDirectory;
use crate::types::{GrantId, TargetRef, UserId};

/// Stored in place of a display name the target could not produce.
pub const TARGET_PLACEHOLDER: &str = "not found";

/// Full-name projection of a record with no resolvable subject.
pub const USER_PLACEHOLDER: &str = "user not found";

/// Display names derived from a target entity at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayNames {
    pub capability_name: String,
    pub short_name: String,
}

impl DisplayNames {
    pub fn new(capability_name: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            capability_name: capability_name.into(),
            short_name: short_name.into(),
        }
    }

    /// Both names set to the placeholder.
    pub fn placeholder(placeholder: &str) -> Self {
        Self::new(placeholder, placeholder)
    }
}

/// A grant as stored.
///
/// Fields are public for reading. State changes go through [`approve`],
/// [`revoke`] and [`rerequest`], which are the only ways the registry
/// moves a record between states.
///
/// [`approve`]: GrantRecord::approve
/// [`revoke`]: GrantRecord::revoke
/// [`rerequest`]: GrantRecord::rerequest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub id: GrantId,

    /// What the grant is for, derived from the target.
    pub capability_name: String,

    /// Secondary display name, derived from the target.
    pub short_name: String,

    /// The entity access is granted to. Immutable after creation.
    pub target: TargetRef,

    /// Subject of the grant; `None` for unassigned records.
    pub user: Option<UserId>,

    /// Administrator who last transitioned the record.
    pub granted_by: Option<UserId>,

    pub state: GrantState,

    /// Creation time (Unix ms). Never changes.
    pub requested_at: i64,

    /// Last administrator transition (Unix ms).
    pub changed_at: Option<i64>,
}

impl GrantRecord {
    /// The legacy flag triple for this record.
    pub fn flags(&self) -> GrantFlags {
        self.state.flags()
    }

    pub fn is_active(&self) -> bool {
        self.state == GrantState::Active
    }

    /// Move to ACTIVE on behalf of `admin`.
    ///
    /// Approving an already active record only refreshes the stamp.
    pub fn approve(&mut self, admin: UserId, now: i64) {
        self.state = GrantState::Active;
        self.granted_by = Some(admin);
        self.changed_at = Some(now);
    }

    /// Move to REVOKED. Returns `false` if the record already was.
    pub fn revoke(&mut self, now: i64) -> bool {
        if self.state == GrantState::Revoked {
            return false;
        }
        self.state = GrantState::Revoked;
        self.changed_at = Some(now);
        true
    }

    /// A user asks again: REVOKED becomes PENDING.
    ///
    /// Pending and active records are left alone and `false` is returned.
    /// `changed_at` is not touched since no administrator acted.
    pub fn rerequest(&mut self) -> bool {
        if self.state != GrantState::Revoked {
            return false;
        }
        self.state = GrantState::Pending;
        true
    }

    /// Replace the derived display names.
    pub fn set_display_names(&mut self, names: DisplayNames) {
        self.capability_name = names.capability_name;
        self.short_name = names.short_name;
    }

    /// Full name of the subject, or `placeholder` when there is none.
    pub fn user_full_name(&self, users: &dyn UserDirectory, placeholder: &str) -> String {
        self.user
            .and_then(|user| users.full_name(user))
            .unwrap_or_else(|| placeholder.to_string())
    }
}

/// A record about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub names: DisplayNames,
    pub target: TargetRef,
    pub user: Option<UserId>,
    pub granted_by: Option<UserId>,
    pub state: GrantState,
    pub requested_at: i64,
    pub changed_at: Option<i64>,
}

impl NewGrant {
    /// A user's access request: PENDING, no administrator yet.
    pub fn request(user: UserId, target: TargetRef, names: DisplayNames, now: i64) -> Self {
        Self {
            names,
            target,
            user: Some(user),
            granted_by: None,
            state: GrantState::Pending,
            requested_at: now,
            changed_at: None,
        }
    }

    /// An administrator's direct grant: ACTIVE from the start.
    pub fn direct(
        user: UserId,
        target: TargetRef,
        names: DisplayNames,
        admin: UserId,
        now: i64,
    ) -> Self {
        Self {
            names,
            target,
            user: Some(user),
            granted_by: Some(admin),
            state: GrantState::Active,
            requested_at: now,
            changed_at: Some(now),
        }
    }

    /// Attach the store-assigned id.
    pub fn into_record(self, id: GrantId) -> GrantRecord {
        GrantRecord {
            id,
            capability_name: self.names.capability_name,
            short_name: self.names.short_name,
            target: self.target,
            user: self.user,
            granted_by: self.granted_by,
            state: self.state,
            requested_at: self.requested_at,
            changed_at: self.changed_at,
        }
    }
}

/// A grant seen from one (user, target) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTargetGrant {
    pub capability_name: String,
    pub target: TargetRef,
}

/// Listing row for an active grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveGrant {
    pub capability_name: String,
    pub target: TargetRef,
    pub requested_at: i64,
}

/// Listing row for a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGrant {
    pub capability_name: String,
    pub target: TargetRef,
    pub requested_at: i64,
}

/// Listing row for a revoked grant; shows when it was withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedGrant {
    pub capability_name: String,
    pub target: TargetRef,
    pub changed_at: Option<i64>,
}

impl From<&GrantRecord> for UserTargetGrant {
    fn from(record: &GrantRecord) -> Self {
        Self {
            capability_name: record.capability_name.clone(),
            target: record.target.clone(),
        }
    }
}

impl From<&GrantRecord> for ActiveGrant {
    fn from(record: &GrantRecord) -> Self {
        Self {
            capability_name: record.capability_name.clone(),
            target: record.target.clone(),
            requested_at: record.requested_at,
        }
    }
}

impl From<&GrantRecord> for PendingGrant {
    fn from(record: &GrantRecord) -> Self {
        Self {
            capability_name: record.capability_name.clone(),
            target: record.target.clone(),
            requested_at: record.requested_at,
        }
    }
}

impl From<&GrantRecord> for RevokedGrant {
    fn from(record: &GrantRecord) -> Self {
        Self {
            capability_name: record.capability_name.clone(),
            target: record.target.clone(),
            changed_at: record.changed_at,
        }
    }
}
