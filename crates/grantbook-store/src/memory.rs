//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use grantbook_core::{GrantId, GrantRecord, NewGrant};

use crate::error::Result;
use crate::traits::{mutate, GrantFilter, GrantMutator, Store, Upsert};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; a
/// write holds the lock for the whole read-modify-write, which gives the
/// same atomicity as a SQLite transaction. Mutators run before anything is
/// written back, so a panicking mutator leaves the map untouched and the
/// poisoned lock is safe to reuse.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Last assigned id.
    last_id: i64,

    /// Records indexed by id; iteration order is id order.
    grants: BTreeMap<GrantId, GrantRecord>,
}

impl MemoryStoreInner {
    fn matching_ids(&self, filter: &GrantFilter) -> Vec<GrantId> {
        let limit = filter.limit.unwrap_or(usize::MAX);
        self.grants
            .values()
            .filter(|g| filter.matches(g))
            .take(limit)
            .map(|g| g.id)
            .collect()
    }

    fn insert(&mut self, grant: &NewGrant) -> GrantRecord {
        self.last_id += 1;
        let record = grant.clone().into_record(GrantId(self.last_id));
        self.grants.insert(record.id, record.clone());
        record
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                last_id: 0,
                grants: BTreeMap::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryStoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryStoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_grant(&self, id: GrantId) -> Result<Option<GrantRecord>> {
        let inner = self.read();
        Ok(inner.grants.get(&id).cloned())
    }

    async fn find_grants(&self, filter: &GrantFilter) -> Result<Vec<GrantRecord>> {
        let inner = self.read();
        let limit = filter.limit.unwrap_or(usize::MAX);

        Ok(inner
            .grants
            .values()
            .filter(|g| filter.matches(g))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_grant(&self, grant: &NewGrant) -> Result<GrantRecord> {
        let mut inner = self.write();
        Ok(inner.insert(grant))
    }

    async fn update_grants(
        &self,
        filter: &GrantFilter,
        mut apply: GrantMutator,
    ) -> Result<Vec<GrantRecord>> {
        let mut inner = self.write();

        let changed: Vec<GrantRecord> = inner
            .matching_ids(filter)
            .into_iter()
            .filter_map(|id| inner.grants.get(&id))
            .filter_map(|record| mutate(record, &mut apply))
            .collect();

        for updated in &changed {
            inner.grants.insert(updated.id, updated.clone());
        }

        Ok(changed)
    }

    async fn upsert_grant(
        &self,
        filter: &GrantFilter,
        grant: NewGrant,
        mut apply: GrantMutator,
    ) -> Result<Upsert> {
        let mut inner = self.write();

        let existing = inner
            .grants
            .values()
            .find(|g| filter.matches(g))
            .cloned();

        let outcome = match existing {
            Some(existing) => match mutate(&existing, &mut apply) {
                Some(updated) => {
                    inner.grants.insert(updated.id, updated.clone());
                    Upsert::Updated(updated)
                }
                None => Upsert::Unchanged(existing),
            },
            None => Upsert::Inserted(inner.insert(&grant)),
        };

        Ok(outcome)
    }

    async fn delete_grants(&self, filter: &GrantFilter) -> Result<usize> {
        let mut inner = self.write();

        let ids = inner.matching_ids(filter);
        for id in &ids {
            inner.grants.remove(id);
        }

        Ok(ids.len())
    }
}
