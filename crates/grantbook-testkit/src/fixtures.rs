//! Test fixtures and helpers.
//!
//! Sample target kinds, a user directory and a ready-made registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use grantbook::{
    GrantRegistry, GrantTarget, RegistryConfig, TargetError, TargetId, TargetKind, TargetRef,
    TargetRegistry, TargetResolver, UserDirectory, UserId,
};
use grantbook_store::{MemoryStore, SqliteStore, Store};

pub const SECTION_KIND: &str = "docs.section";
pub const BROKEN_KIND: &str = "legacy.widget";

pub const ADMIN: UserId = UserId(1);
pub const ALICE: UserId = UserId(10);
pub const BOB: UserId = UserId(11);
pub const CAROL: UserId = UserId(12);

fn kind(name: &str) -> TargetKind {
    match TargetKind::new(name) {
        Ok(kind) => kind,
        Err(e) => panic!("fixture kind {name:?} rejected: {e}"),
    }
}

pub fn section_kind() -> TargetKind {
    kind(SECTION_KIND)
}

pub fn broken_kind() -> TargetKind {
    kind(BROKEN_KIND)
}

/// A documentation section users can be granted access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: TargetId,
    pub area: String,
    pub title: String,
}

impl GrantTarget for Section {
    fn target_ref(&self) -> TargetRef {
        TargetRef::new(section_kind(), self.id)
    }

    fn permission_name(&self) -> Result<String, TargetError> {
        Ok(format!("{}: {}", self.area, self.title))
    }

    fn short_name(&self) -> Result<String, TargetError> {
        Ok(self.title.clone())
    }
}

/// A target whose names can never be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenTarget(pub TargetId);

impl GrantTarget for BrokenTarget {
    fn target_ref(&self) -> TargetRef {
        TargetRef::new(broken_kind(), self.0)
    }

    fn permission_name(&self) -> Result<String, TargetError> {
        Err(TargetError::NameUnavailable(format!("widget {} has no label", self.0)))
    }

    fn short_name(&self) -> Result<String, TargetError> {
        Err(TargetError::NameUnavailable(format!("widget {} has no label", self.0)))
    }
}

/// Shared, mutable set of sections. Doubles as the resolver for their kind.
#[derive(Clone)]
pub struct SectionCatalog {
    kind: TargetKind,
    next_id: Arc<AtomicI64>,
    sections: Arc<RwLock<HashMap<TargetId, Section>>>,
}

impl SectionCatalog {
    pub fn new() -> Self {
        Self {
            kind: section_kind(),
            next_id: Arc::new(AtomicI64::new(1)),
            sections: Arc::default(),
        }
    }

    /// Add a section with the next free id.
    pub fn add(&self, area: &str, title: &str) -> Section {
        let section = Section {
            id: TargetId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            area: area.to_string(),
            title: title.to_string(),
        };
        self.sections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(section.id, section.clone());
        section
    }

    pub fn rename(&self, id: TargetId, title: &str) {
        let mut sections = self.sections.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(section) = sections.get_mut(&id) {
            section.title = title.to_string();
        }
    }

    pub fn remove(&self, id: TargetId) {
        self.sections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

impl Default for SectionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetResolver for SectionCatalog {
    fn kind(&self) -> &TargetKind {
        &self.kind
    }

    fn lookup(&self, id: TargetId) -> Result<Option<Box<dyn GrantTarget>>, TargetError> {
        let sections = self
            .sections
            .read()
            .map_err(|e| TargetError::Lookup(e.to_string()))?;
        Ok(sections
            .get(&id)
            .cloned()
            .map(|s| Box::new(s) as Box<dyn GrantTarget>))
    }
}

/// Resolver for [`BrokenTarget`]: every id exists, no name ever resolves.
pub struct BrokenResolver(TargetKind);

impl Default for BrokenResolver {
    fn default() -> Self {
        Self(broken_kind())
    }
}

impl TargetResolver for BrokenResolver {
    fn kind(&self) -> &TargetKind {
        &self.0
    }

    fn lookup(&self, id: TargetId) -> Result<Option<Box<dyn GrantTarget>>, TargetError> {
        Ok(Some(Box::new(BrokenTarget(id))))
    }
}

/// In-memory identity store.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    names: HashMap<UserId, String>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, user: UserId, full_name: &str) -> Self {
        self.names.insert(user, full_name.to_string());
        self
    }
}

impl UserDirectory for Directory {
    fn full_name(&self, user: UserId) -> Option<String> {
        self.names.get(&user).cloned()
    }
}

/// A registry over `S` with sections and broken widgets registered.
pub struct TestFixture<S: Store = MemoryStore> {
    pub registry: GrantRegistry<S>,
    pub sections: SectionCatalog,
    pub users: Directory,
}

impl TestFixture<MemoryStore> {
    /// Create a fixture over a fresh memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture<SqliteStore> {
    /// Create a fixture over an in-memory SQLite database.
    pub fn sqlite() -> grantbook_store::Result<Self> {
        Ok(Self::with_store(SqliteStore::open_memory()?))
    }
}

impl<S: Store> TestFixture<S> {
    /// Create a fixture over an existing store, with default config.
    pub fn with_store(store: S) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    pub fn with_config(store: S, config: RegistryConfig) -> Self {
        let sections = SectionCatalog::new();
        let targets = TargetRegistry::new()
            .with(sections.clone())
            .with(BrokenResolver::default());

        Self {
            registry: GrantRegistry::new(store, targets, config),
            sections,
            users: Directory::new()
                .with(ADMIN, "Grace Hopper")
                .with(ALICE, "Alice Liddell")
                .with(BOB, "Bob Marley"),
        }
    }

    /// Add a section to the catalog.
    pub fn section(&self, area: &str, title: &str) -> Section {
        self.sections.add(area, title)
    }
}
