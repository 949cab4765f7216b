//! In-memory Document Store.
//!
//! Evaluates the shared predicate from [`ctx_core::scope`] directly against
//! documents held in process. Used by embedders that keep contexts in memory
//! and as the reference strategy the PostgreSQL queries are tested against.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

use ctx_core::{
    DocumentId, DocumentStore, HierarchyStore, OwnerRef, SchemaContract, SchemaId,
    ScopeAttributes, ScopedDocument, TargetId, TreeIndex, matches, sort_documents
};
use errors::StorageError;

const BACKEND: &str = "memory";

#[derive(Default)]
struct State {
    documents: HashMap<DocumentId, ScopedDocument>,
    schemas: HashMap<SchemaId, SchemaContract>,
    tree: TreeIndex
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(tree: TreeIndex) -> Self {
        Self {
            state: RwLock::new(State {
                tree,
                ..Default::default()
            })
        }
    }

    fn matching(state: &State, target: &ScopeAttributes) -> Vec<ScopedDocument> {
        let mut found: Vec<ScopedDocument> = state
            .documents
            .values()
            .filter(|doc| matches(doc, target, &state.tree))
            .cloned()
            .collect();
        sort_documents(&mut found);
        found
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_matching_documents(
        &self,
        target: &ScopeAttributes
    ) -> Result<Vec<ScopedDocument>, StorageError> {
        let state = self.state.read();
        let found = Self::matching(&state, target);
        trace!("{} documents match target {}", found.len(), target.target_id);
        Ok(found)
    }

    async fn find_matching_documents_batch(
        &self,
        targets: &[ScopeAttributes]
    ) -> Result<BTreeMap<TargetId, Vec<ScopedDocument>>, StorageError> {
        let state = self.state.read();
        let mut result = BTreeMap::new();
        for target in targets {
            if result.contains_key(&target.target_id) {
                continue;
            }
            result.insert(target.target_id.clone(), Self::matching(&state, target));
        }
        Ok(result)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<ScopedDocument>, StorageError> {
        Ok(self.state.read().documents.get(&id).cloned())
    }

    async fn find_document_by_identity(
        &self,
        name: &str,
        owner: Option<&OwnerRef>
    ) -> Result<Option<ScopedDocument>, StorageError> {
        Ok(self
            .state
            .read()
            .documents
            .values()
            .find(|doc| doc.same_identity(name, owner))
            .cloned())
    }

    async fn list_documents(&self) -> Result<Vec<ScopedDocument>, StorageError> {
        let mut documents: Vec<ScopedDocument> =
            self.state.read().documents.values().cloned().collect();
        sort_documents(&mut documents);
        Ok(documents)
    }

    async fn list_owned_documents(
        &self,
        owner: &OwnerRef
    ) -> Result<Vec<ScopedDocument>, StorageError> {
        let mut documents: Vec<ScopedDocument> = self
            .state
            .read()
            .documents
            .values()
            .filter(|doc| doc.owner.as_ref() == Some(owner))
            .cloned()
            .collect();
        sort_documents(&mut documents);
        Ok(documents)
    }

    async fn count_documents_with_schema(&self, schema: SchemaId) -> Result<usize, StorageError> {
        Ok(self
            .state
            .read()
            .documents
            .values()
            .filter(|doc| doc.schema == Some(schema))
            .count())
    }

    async fn insert_document(&self, document: &ScopedDocument) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let taken = state.documents.contains_key(&document.id)
            || state
                .documents
                .values()
                .any(|doc| doc.same_identity(&document.name, document.owner.as_ref()));
        if taken {
            return Err(StorageError::QueryError {
                backend: BACKEND.to_string(),
                reason: format!("document identity already exists: {}", document.name)
            });
        }
        state.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update_document(&self, document: &ScopedDocument) -> Result<(), StorageError> {
        let mut state = self.state.write();
        match state.documents.get_mut(&document.id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                backend: BACKEND.to_string(),
                id: document.id.to_string()
            })
        }
    }

    async fn delete_document(&self, id: DocumentId) -> Result<bool, StorageError> {
        Ok(self.state.write().documents.remove(&id).is_some())
    }

    async fn get_schema(&self, id: SchemaId) -> Result<Option<SchemaContract>, StorageError> {
        Ok(self.state.read().schemas.get(&id).cloned())
    }

    async fn find_schema_by_name(
        &self,
        name: &str
    ) -> Result<Option<SchemaContract>, StorageError> {
        Ok(self
            .state
            .read()
            .schemas
            .values()
            .find(|s| s.name == name)
            .cloned())
    }

    async fn insert_schema(&self, schema: &SchemaContract) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if state.schemas.values().any(|s| s.name == schema.name) {
            return Err(StorageError::QueryError {
                backend: BACKEND.to_string(),
                reason: format!("schema name already exists: {}", schema.name)
            });
        }
        state.schemas.insert(schema.id, schema.clone());
        Ok(())
    }

    async fn update_schema(&self, schema: &SchemaContract) -> Result<(), StorageError> {
        let mut state = self.state.write();
        match state.schemas.get_mut(&schema.id) {
            Some(existing) => {
                *existing = schema.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                backend: BACKEND.to_string(),
                id: schema.id.to_string()
            })
        }
    }

    async fn delete_schema(&self, id: SchemaId) -> Result<bool, StorageError> {
        Ok(self.state.write().schemas.remove(&id).is_some())
    }
}

#[async_trait]
impl HierarchyStore for InMemoryStore {
    async fn load_tree(&self) -> Result<TreeIndex, StorageError> {
        Ok(self.state.read().tree.clone())
    }

    async fn replace_tree(&self, tree: &TreeIndex) -> Result<(), StorageError> {
        self.state.write().tree = tree.clone();
        Ok(())
    }
}
