//! Core traits for the context resolution engine

use async_trait::async_trait;
use std::collections::BTreeMap;

use errors::StorageError;

use crate::scope::ScopeAttributes;
use crate::tree::TreeIndex;
use crate::types::{
    DocumentId, LocalOverride, OwnerRef, SchemaContract, SchemaId, ScopedDocument, TargetId,
    TargetKind
};

/// Anything configuration contexts can be resolved for.
pub trait ContextTarget: Send + Sync {
    fn target_id(&self) -> &TargetId;

    fn kind(&self) -> TargetKind;

    /// The concrete scope values used for matching.
    fn scope_attributes(&self) -> ScopeAttributes;

    fn local_override(&self) -> Option<&LocalOverride>;

    fn set_local_override(&mut self, local_override: Option<LocalOverride>);
}

/// Persistence collaborator for scoped documents and schema contracts.
///
/// Matching queries return active documents only. Ordering of the returned
/// lists is not part of the contract; resolvers sort with
/// [`crate::scope::document_order`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_matching_documents(
        &self,
        target: &ScopeAttributes,
    ) -> Result<Vec<ScopedDocument>, StorageError>;

    /// One entry per distinct target id in `targets`, empty when nothing
    /// matches.
    async fn find_matching_documents_batch(
        &self,
        targets: &[ScopeAttributes],
    ) -> Result<BTreeMap<TargetId, Vec<ScopedDocument>>, StorageError>;

    async fn get_document(&self, id: DocumentId) -> Result<Option<ScopedDocument>, StorageError>;

    /// Look a document up by `(name, owner)`, treating a missing owner as a
    /// concrete value rather than a wildcard.
    async fn find_document_by_identity(
        &self,
        name: &str,
        owner: Option<&OwnerRef>,
    ) -> Result<Option<ScopedDocument>, StorageError>;

    async fn list_documents(&self) -> Result<Vec<ScopedDocument>, StorageError>;

    async fn list_owned_documents(
        &self,
        owner: &OwnerRef,
    ) -> Result<Vec<ScopedDocument>, StorageError>;

    async fn count_documents_with_schema(&self, schema: SchemaId) -> Result<usize, StorageError>;

    async fn insert_document(&self, document: &ScopedDocument) -> Result<(), StorageError>;

    async fn update_document(&self, document: &ScopedDocument) -> Result<(), StorageError>;

    async fn delete_document(&self, id: DocumentId) -> Result<bool, StorageError>;

    async fn get_schema(&self, id: SchemaId) -> Result<Option<SchemaContract>, StorageError>;

    async fn find_schema_by_name(&self, name: &str)
    -> Result<Option<SchemaContract>, StorageError>;

    async fn insert_schema(&self, schema: &SchemaContract) -> Result<(), StorageError>;

    async fn update_schema(&self, schema: &SchemaContract) -> Result<(), StorageError>;

    async fn delete_schema(&self, id: SchemaId) -> Result<bool, StorageError>;
}

/// Persistence of the region hierarchy placements.
///
/// The hierarchy owner edits a [`TreeIndex`] and writes every placement back
/// in one step; stores never patch placements individually.
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    async fn load_tree(&self) -> Result<TreeIndex, StorageError>;

    async fn replace_tree(&self, tree: &TreeIndex) -> Result<(), StorageError>;
}
