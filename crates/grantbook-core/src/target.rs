//! The target entity contract and per-kind resolution.
//!
//! The registry knows nothing about what a target is. Every grantable
//! entity implements [`GrantTarget`], and every kind of entity registers a
//! [`TargetResolver`] so a stored [`TargetRef`] can be turned back into a
//! live entity when its display names must be recomputed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::TargetError;
use crate::types::{TargetId, TargetKind, TargetRef};

/// An entity that access can be granted to.
pub trait GrantTarget: Send + Sync {
    /// Kind discriminator and id of this entity.
    fn target_ref(&self) -> TargetRef;

    /// Full permission name: the section plus what access is granted to.
    fn permission_name(&self) -> Result<String, TargetError>;

    /// Short display name.
    fn short_name(&self) -> Result<String, TargetError>;
}

/// Looks up live entities of one kind.
pub trait TargetResolver: Send + Sync {
    /// The kind this resolver serves.
    fn kind(&self) -> &TargetKind;

    /// Load the entity with the given id. `Ok(None)` means it is gone.
    fn lookup(&self, id: TargetId) -> Result<Option<Box<dyn GrantTarget>>, TargetError>;
}

/// Map from kind discriminator to resolver.
#[derive(Clone, Default)]
pub struct TargetRegistry {
    resolvers: HashMap<TargetKind, Arc<dyn TargetResolver>>,
}

impl TargetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver under its own kind, replacing any previous one.
    pub fn register<R>(&mut self, resolver: R) -> Option<Arc<dyn TargetResolver>>
    where
        R: TargetResolver + 'static,
    {
        let kind = resolver.kind().clone();
        self.resolvers.insert(kind, Arc::new(resolver))
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<R>(mut self, resolver: R) -> Self
    where
        R: TargetResolver + 'static,
    {
        self.register(resolver);
        self
    }

    /// Whether a resolver exists for `kind`.
    pub fn is_registered(&self, kind: &TargetKind) -> bool {
        self.resolvers.contains_key(kind)
    }

    /// Registered kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &TargetKind> {
        self.resolvers.keys()
    }

    /// Resolve a reference to its live entity.
    pub fn resolve(&self, target: &TargetRef) -> Result<Box<dyn GrantTarget>, TargetError> {
        let resolver = self
            .resolvers
            .get(&target.kind)
            .ok_or_else(|| TargetError::UnknownKind(target.kind.clone()))?;

        resolver
            .lookup(target.id)?
            .ok_or_else(|| TargetError::Missing(target.clone()))
    }
}

impl fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.resolvers.keys().map(TargetKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("TargetRegistry").field("kinds", &kinds).finish()
    }
}
