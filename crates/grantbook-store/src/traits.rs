//! Store trait: the abstract interface for grant persistence.
//!
//! This trait allows the registry to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use grantbook_core::{
    GrantId, GrantRecord, GrantState, NewGrant, TargetId, TargetKind, TargetRef, UserId,
};

use crate::error::Result;

/// A read-modify-write step.
///
/// Called once per matching record inside the store's transaction. Returns
/// `true` if it changed the record and the change must be written back.
pub type GrantMutator = Box<dyn FnMut(&mut GrantRecord) -> bool + Send>;

/// Constraint on the subject of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserFilter {
    /// Any subject, including none.
    #[default]
    Any,
    /// Only records with no subject attached.
    Unassigned,
    /// Only records of this subject.
    User(UserId),
}

/// Which records an operation applies to.
///
/// Results are always ordered by grant id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantFilter {
    pub id: Option<GrantId>,
    pub user: UserFilter,
    pub target_kind: Option<TargetKind>,
    pub target_id: Option<TargetId>,
    /// Allowed states; empty means any state.
    pub states: Vec<GrantState>,
    pub limit: Option<usize>,
}

impl GrantFilter {
    /// Every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// The single record with this id.
    pub fn by_id(id: GrantId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Records of one subject.
    pub fn for_user(user: UserId) -> Self {
        Self {
            user: UserFilter::User(user),
            ..Self::default()
        }
    }

    /// Records with no subject.
    pub fn unassigned() -> Self {
        Self {
            user: UserFilter::Unassigned,
            ..Self::default()
        }
    }

    /// Restrict to one target entity.
    pub fn target(mut self, target: &TargetRef) -> Self {
        self.target_kind = Some(target.kind.clone());
        self.target_id = Some(target.id);
        self
    }

    /// Restrict to one target kind.
    pub fn kind(mut self, kind: &TargetKind) -> Self {
        self.target_kind = Some(kind.clone());
        self
    }

    /// Add an allowed state.
    pub fn state(mut self, state: GrantState) -> Self {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
        self
    }

    /// Add an optional state constraint.
    pub fn maybe_state(self, state: Option<GrantState>) -> Self {
        match state {
            Some(state) => self.state(state),
            None => self,
        }
    }

    /// Return or touch at most `limit` records.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the filter against a record, ignoring `limit`.
    pub fn matches(&self, record: &GrantRecord) -> bool {
        let user_ok = match self.user {
            UserFilter::Any => true,
            UserFilter::Unassigned => record.user.is_none(),
            UserFilter::User(user) => record.user == Some(user),
        };

        user_ok
            && self.id.map_or(true, |id| record.id == id)
            && self
                .target_kind
                .as_ref()
                .map_or(true, |kind| &record.target.kind == kind)
            && self.target_id.map_or(true, |id| record.target.id == id)
            && (self.states.is_empty() || self.states.contains(&record.state))
    }
}

/// Outcome of [`Store::upsert_grant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    /// No record matched; the new grant was inserted.
    Inserted(GrantRecord),
    /// An existing record was changed.
    Updated(GrantRecord),
    /// An existing record matched and the mutator left it as it was.
    Unchanged(GrantRecord),
}

impl Upsert {
    /// The record as it now stands.
    pub fn record(&self) -> &GrantRecord {
        match self {
            Upsert::Inserted(r) | Upsert::Updated(r) | Upsert::Unchanged(r) => r,
        }
    }

    pub fn into_record(self) -> GrantRecord {
        match self {
            Upsert::Inserted(r) | Upsert::Updated(r) | Upsert::Unchanged(r) => r,
        }
    }
}

/// The Store trait: async interface for grant persistence.
///
/// # Design Notes
///
/// - **Transactions**: `update_grants`, `upsert_grant` and `delete_grants`
///   each run as one atomic unit. Concurrent callers touching the same
///   records are serialized; nobody observes a half-applied change.
/// - **Immutable columns**: id, target and `requested_at` are never written
///   by an update, whatever the mutator does to them.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a record by id.
    async fn get_grant(&self, id: GrantId) -> Result<Option<GrantRecord>>;

    /// All records matching `filter`, ordered by id.
    async fn find_grants(&self, filter: &GrantFilter) -> Result<Vec<GrantRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new record and return it with its assigned id.
    async fn insert_grant(&self, grant: &NewGrant) -> Result<GrantRecord>;

    /// Apply `apply` to every record matching `filter` in one transaction.
    ///
    /// Returns the records that were changed, as written.
    async fn update_grants(
        &self,
        filter: &GrantFilter,
        apply: GrantMutator,
    ) -> Result<Vec<GrantRecord>>;

    /// Find-or-create in one transaction.
    ///
    /// If a record matches `filter`, the first one (by id) is passed to
    /// `apply`. Otherwise `grant` is inserted.
    async fn upsert_grant(
        &self,
        filter: &GrantFilter,
        grant: NewGrant,
        apply: GrantMutator,
    ) -> Result<Upsert>;

    /// Remove every record matching `filter`. Returns how many were removed.
    async fn delete_grants(&self, filter: &GrantFilter) -> Result<usize>;
}

/// Run a mutator against a copy of `record`.
///
/// Returns the changed copy, with the immutable columns restored, or `None`
/// if the mutator reported no change.
pub(crate) fn mutate(record: &GrantRecord, apply: &mut GrantMutator) -> Option<GrantRecord> {
    let mut updated = record.clone();
    if !apply(&mut updated) {
        return None;
    }

    updated.id = record.id;
    updated.target = record.target.clone();
    updated.requested_at = record.requested_at;
    Some(updated)
}
