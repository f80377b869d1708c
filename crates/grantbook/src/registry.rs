//! The GrantRegistry: lifecycle transitions and queries over grant records.
//!
//! Every state change goes through this type. Callers never flip a
//! record's state themselves; they ask the registry, which runs the
//! change as one read-modify-write inside the store's transaction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use grantbook_core::{
    ActiveGrant, DisplayNames, GrantId, GrantRecord, GrantState, GrantTarget, NewGrant,
    PendingGrant, RevokedGrant, TargetKind, TargetRef, TargetRegistry, UserId, UserTargetGrant,
};
use grantbook_store::{now_millis, GrantFilter, GrantMutator, SqliteStore, Store, Upsert};

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::names::{names_by_target, names_for};

/// Result of a user's access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// No record existed; a pending one was created.
    Created(GrantRecord),
    /// A revoked record was moved back to pending.
    Renewed(GrantRecord),
    /// The request is already waiting; nothing changed.
    AlreadyPending(GrantRecord),
    /// Access is already granted; nothing changed.
    AlreadyActive(GrantRecord),
}

impl RequestOutcome {
    /// The record as it now stands.
    pub fn record(&self) -> &GrantRecord {
        match self {
            RequestOutcome::Created(r)
            | RequestOutcome::Renewed(r)
            | RequestOutcome::AlreadyPending(r)
            | RequestOutcome::AlreadyActive(r) => r,
        }
    }

    /// Whether the request wrote anything.
    pub fn changed(&self) -> bool {
        matches!(self, RequestOutcome::Created(_) | RequestOutcome::Renewed(_))
    }
}

/// The registry of grants.
///
/// Holds its store and the per-kind target resolvers explicitly; build one
/// and hand it to whoever needs it.
pub struct GrantRegistry<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Resolvers used to recompute display names from stored references.
    targets: Arc<TargetRegistry>,
    /// Configuration.
    config: RegistryConfig,
}

impl GrantRegistry<SqliteStore> {
    /// Open a registry over a SQLite file, applying `config.store`.
    pub fn open(
        path: impl AsRef<Path>,
        targets: TargetRegistry,
        config: RegistryConfig,
    ) -> Result<Self> {
        let store = SqliteStore::open_with(path, &config.store)?;
        Ok(Self::new(store, targets, config))
    }
}

impl<S: Store> GrantRegistry<S> {
    /// Create a new registry.
    pub fn new(store: S, targets: TargetRegistry, config: RegistryConfig) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(targets), config)
    }

    /// Create a registry over a store and resolvers shared with others.
    pub fn from_shared(store: Arc<S>, targets: Arc<TargetRegistry>, config: RegistryConfig) -> Self {
        Self {
            store,
            targets,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the target resolvers.
    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    /// Get the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Target Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// The kind discriminator stored for a target entity.
    pub fn target_kind(&self, target: &dyn GrantTarget) -> TargetKind {
        target.target_ref().kind
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a record by id.
    pub async fn get(&self, id: GrantId) -> Result<Option<GrantRecord>> {
        Ok(self.store.get_grant(id).await?)
    }

    /// Every record in `state`, across all users.
    pub async fn for_state(&self, state: GrantState) -> Result<Vec<GrantRecord>> {
        self.find(GrantFilter::all().state(state)).await
    }

    /// Every record whose target is of `kind`.
    pub async fn for_target_kind(&self, kind: &TargetKind) -> Result<Vec<GrantRecord>> {
        self.find(GrantFilter::all().kind(kind)).await
    }

    /// Records for one target entity, optionally only those in `state`.
    pub async fn for_target(
        &self,
        target: &dyn GrantTarget,
        state: Option<GrantState>,
    ) -> Result<Vec<GrantRecord>> {
        self.find(GrantFilter::all().target(&target.target_ref()).maybe_state(state))
            .await
    }

    /// Records of one (user, target) pair.
    pub async fn for_user_and_target(
        &self,
        user: UserId,
        target: &dyn GrantTarget,
        state: Option<GrantState>,
    ) -> Result<Vec<UserTargetGrant>> {
        let filter = GrantFilter::for_user(user)
            .target(&target.target_ref())
            .maybe_state(state);
        Ok(self.find(filter).await?.iter().map(UserTargetGrant::from).collect())
    }

    /// Every record of a user, in any state.
    pub async fn for_user(&self, user: UserId) -> Result<Vec<GrantRecord>> {
        self.find(GrantFilter::for_user(user)).await
    }

    /// What the user may currently do.
    pub async fn active_for_user(&self, user: UserId) -> Result<Vec<ActiveGrant>> {
        let records = self
            .find(GrantFilter::for_user(user).state(GrantState::Active))
            .await?;
        Ok(records.iter().map(ActiveGrant::from).collect())
    }

    /// What the user has asked for and is still waiting on.
    pub async fn pending_for_user(&self, user: UserId) -> Result<Vec<PendingGrant>> {
        let records = self
            .find(GrantFilter::for_user(user).state(GrantState::Pending))
            .await?;
        Ok(records.iter().map(PendingGrant::from).collect())
    }

    /// What the user used to be allowed.
    pub async fn revoked_for_user(&self, user: UserId) -> Result<Vec<RevokedGrant>> {
        let records = self
            .find(GrantFilter::for_user(user).state(GrantState::Revoked))
            .await?;
        Ok(records.iter().map(RevokedGrant::from).collect())
    }

    pub(crate) async fn find(&self, filter: GrantFilter) -> Result<Vec<GrantRecord>> {
        let records = self.store.find_grants(&filter).await?;
        tracing::debug!(?filter, count = records.len(), "grant query");
        Ok(records)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// A user asks for access to `target`.
    ///
    /// Creates a pending record, or moves a revoked one back to pending.
    /// A pending or active record is returned untouched.
    pub async fn request(&self, user: UserId, target: &dyn GrantTarget) -> Result<RequestOutcome> {
        let target_ref = target.target_ref();
        let names = names_for(target, &self.config.placeholders.target);
        let grant = NewGrant::request(user, target_ref.clone(), names.clone(), now_millis());

        let apply: GrantMutator = Box::new(move |record: &mut GrantRecord| {
            if !record.rerequest() {
                return false;
            }
            record.set_display_names(names.clone());
            true
        });

        let filter = GrantFilter::for_user(user).target(&target_ref);
        let outcome = match self.store.upsert_grant(&filter, grant, apply).await? {
            Upsert::Inserted(record) => RequestOutcome::Created(record),
            Upsert::Updated(record) => RequestOutcome::Renewed(record),
            Upsert::Unchanged(record) if record.is_active() => RequestOutcome::AlreadyActive(record),
            Upsert::Unchanged(record) => RequestOutcome::AlreadyPending(record),
        };

        tracing::info!(
            %user,
            target_ref = %target_ref,
            grant_id = %outcome.record().id,
            state = %outcome.record().state,
            changed = outcome.changed(),
            "access requested"
        );
        Ok(outcome)
    }

    /// An administrator grants access directly.
    ///
    /// Creates an active record, or approves the existing one for the pair.
    pub async fn grant(
        &self,
        user: UserId,
        target: &dyn GrantTarget,
        admin: UserId,
    ) -> Result<GrantRecord> {
        let target_ref = target.target_ref();
        let names = names_for(target, &self.config.placeholders.target);
        let now = now_millis();
        let grant = NewGrant::direct(user, target_ref.clone(), names.clone(), admin, now);

        let apply: GrantMutator = Box::new(move |record: &mut GrantRecord| {
            record.approve(admin, now);
            record.set_display_names(names.clone());
            true
        });

        let filter = GrantFilter::for_user(user).target(&target_ref);
        let record = self.store.upsert_grant(&filter, grant, apply).await?.into_record();

        tracing::info!(%user, %admin, target_ref = %target_ref, grant_id = %record.id, "access granted");
        Ok(record)
    }

    /// Approve one record. Returns `None` if no record has this id.
    ///
    /// Pending and revoked records become active; an active record only
    /// gets a fresh admin stamp.
    pub async fn approve(&self, id: GrantId, admin: UserId) -> Result<Option<GrantRecord>> {
        let filter = GrantFilter::by_id(id);
        let names = self.resolve_names(&filter).await?;
        let changed = self
            .store
            .update_grants(&filter, approver(admin, names))
            .await?;

        let record = changed.into_iter().next();
        match &record {
            Some(r) => tracing::info!(grant_id = %id, %admin, target_ref = %r.target, "grant approved"),
            None => tracing::debug!(grant_id = %id, "approve matched no grant"),
        }
        Ok(record)
    }

    /// Approve every pending record of `user` in one transaction.
    ///
    /// Unassigned records never match. A request revoked concurrently is
    /// either approved before the revoke lands or stays revoked; both run
    /// in their own transaction, so no record ends up half-changed.
    pub async fn approve_all_pending(&self, user: UserId, admin: UserId) -> Result<Vec<GrantRecord>> {
        let filter = GrantFilter::for_user(user).state(GrantState::Pending);
        let names = self.resolve_names(&filter).await?;
        let approved = self
            .store
            .update_grants(&filter, approver(admin, names))
            .await?;

        tracing::info!(%user, %admin, count = approved.len(), "pending grants approved");
        Ok(approved)
    }

    /// Withdraw a user's access to a target, keeping the record.
    ///
    /// The first active or pending record for the pair becomes revoked.
    /// Returns `None`, and changes nothing, if there is no such record.
    pub async fn revoke(&self, user: UserId, target: &TargetRef) -> Result<Option<GrantRecord>> {
        let filter = GrantFilter::for_user(user)
            .target(target)
            .state(GrantState::Active)
            .state(GrantState::Pending)
            .limit(1);

        let names = self.resolve_names(&filter).await?;
        let now = now_millis();
        let apply: GrantMutator = Box::new(move |record: &mut GrantRecord| {
            if !record.revoke(now) {
                return false;
            }
            apply_names(record, &names);
            true
        });

        let record = self.store.update_grants(&filter, apply).await?.into_iter().next();
        match &record {
            Some(r) => tracing::info!(%user, target_ref = %target, grant_id = %r.id, "grant revoked"),
            None => tracing::debug!(%user, target_ref = %target, "revoke matched no live grant"),
        }
        Ok(record)
    }

    /// Remove every record of the (user, target) pair, in any state.
    ///
    /// Used for cleanup when the target itself goes away; normal access
    /// withdrawal is [`revoke`](Self::revoke).
    pub async fn delete_for_target(&self, user: UserId, target: &dyn GrantTarget) -> Result<usize> {
        let target_ref = target.target_ref();
        let removed = self
            .store
            .delete_grants(&GrantFilter::for_user(user).target(&target_ref))
            .await?;

        tracing::info!(%user, target_ref = %target_ref, removed, "grants deleted");
        Ok(removed)
    }

    /// The user left the identity store: keep their records, unassigned.
    pub async fn detach_user(&self, user: UserId) -> Result<usize> {
        let filter = GrantFilter::for_user(user);
        let names = self.resolve_names(&filter).await?;
        let apply: GrantMutator = Box::new(move |record: &mut GrantRecord| {
            record.user = None;
            apply_names(record, &names);
            true
        });

        let detached = self.store.update_grants(&filter, apply).await?.len();

        tracing::info!(%user, detached, "user detached from grants");
        Ok(detached)
    }

    /// Display names for the targets of every record `filter` matches now.
    ///
    /// Runs before the write transaction so resolver code never executes
    /// while the store is locked.
    async fn resolve_names(&self, filter: &GrantFilter) -> Result<HashMap<TargetRef, DisplayNames>> {
        let records = self.store.find_grants(filter).await?;
        Ok(names_by_target(
            &self.targets,
            &records,
            &self.config.placeholders.target,
        ))
    }
}

/// Mutator that approves a record and refreshes its names.
fn approver(admin: UserId, names: HashMap<TargetRef, DisplayNames>) -> GrantMutator {
    let now = now_millis();
    Box::new(move |record: &mut GrantRecord| {
        record.approve(admin, now);
        apply_names(record, &names);
        true
    })
}

// A record that started matching after names were resolved keeps its old names
fn apply_names(record: &mut GrantRecord, names: &HashMap<TargetRef, DisplayNames>) {
    if let Some(resolved) = names.get(&record.target) {
        record.set_display_names(resolved.clone());
    }
}
