//! Owner registry: which collaborators may own documents.
//!
//! Every [`OwnerKind`] maps to one [`OwnerResolver`]. A document whose owner
//! kind has no resolver, or whose resolver does not know the owner id, is
//! rejected with `UnresolvableOwner`.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use ctx_core::{OwnerKind, OwnerRef};
use errors::{DocumentError, StorageError};

#[async_trait]
pub trait OwnerResolver: Send + Sync {
    /// Whether an owner with this id exists.
    async fn exists(&self, id: &str) -> Result<bool, StorageError>;
}

/// Resolver backed by a fixed, mutable set of known owner ids.
#[derive(Default)]
pub struct StaticOwnerResolver {
    known: RwLock<HashSet<String>>
}

impl StaticOwnerResolver {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        Self {
            known: RwLock::new(ids.into_iter().map(Into::into).collect())
        }
    }

    pub fn register(&self, id: impl Into<String>) {
        self.known.write().insert(id.into());
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.known.write().remove(id)
    }
}

#[async_trait]
impl OwnerResolver for StaticOwnerResolver {
    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.known.read().contains(id))
    }
}

#[derive(Clone, Default)]
pub struct OwnerRegistry {
    resolvers: HashMap<OwnerKind, Arc<dyn OwnerResolver>>
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resolver(mut self, kind: OwnerKind, resolver: Arc<dyn OwnerResolver>) -> Self {
        self.register(kind, resolver);
        self
    }

    pub fn register(&mut self, kind: OwnerKind, resolver: Arc<dyn OwnerResolver>) {
        self.resolvers.insert(kind, resolver);
    }

    pub fn resolver(&self, kind: OwnerKind) -> Option<&Arc<dyn OwnerResolver>> {
        self.resolvers.get(&kind)
    }

    /// Check that `owner` refers to an existing collaborator.
    pub async fn ensure_resolvable(&self, owner: &OwnerRef) -> Result<(), DocumentError> {
        let Some(resolver) = self.resolvers.get(&owner.kind) else {
            return Err(DocumentError::UnresolvableOwner {
                owner: owner.to_string()
            });
        };

        if resolver.exists(&owner.id).await? {
            Ok(())
        } else {
            Err(DocumentError::UnresolvableOwner {
                owner: owner.to_string()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_owner_resolves() {
        let jobs = Arc::new(StaticOwnerResolver::new(["nightly-sync"]));
        let registry = OwnerRegistry::new().with_resolver(OwnerKind::Job, jobs.clone());

        assert!(registry.ensure_resolvable(&OwnerRef::job("nightly-sync")).await.is_ok());

        let err = registry
            .ensure_resolvable(&OwnerRef::job("unknown"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnresolvableOwner { .. }));
        assert_eq!(err.to_string(), "Unresolvable owner: job:unknown");

        jobs.register("unknown");
        assert!(registry.ensure_resolvable(&OwnerRef::job("unknown")).await.is_ok());
        assert!(jobs.unregister("unknown"));
    }

    #[tokio::test]
    async fn test_kind_without_resolver_is_unresolvable() {
        let registry = OwnerRegistry::new();
        let err = registry
            .ensure_resolvable(&OwnerRef::git_repository("configs"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnresolvableOwner { .. }));
        assert!(registry.resolver(OwnerKind::GitRepository).is_none());
    }
}
