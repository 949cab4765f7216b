use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use config::EngineConfig;
use ctx_core::{ContextTarget, DocumentDraft, OwnerRef, SchemaId, TargetId};
use errors::{DocumentError, ResolveError, StorageError};
use storage::StoreHandles;

use crate::batch::BatchResolver;
use crate::hierarchy::HierarchyManager;
use crate::manager::DocumentManager;
use crate::owners::OwnerRegistry;
use crate::resolver::ContextResolver;
use crate::schema::{SchemaValidator, ValidationResult};
use crate::telemetry::Telemetry;
use crate::types::{MatchedDocument, ResolvedContext, SyncReport};

/// Entry point of the engine: read path, write path and hierarchy edits over
/// one store backend.
pub struct ContextEngine {
    resolver: ContextResolver,
    batch: BatchResolver,
    documents: DocumentManager,
    hierarchy: HierarchyManager
}

impl ContextEngine {
    pub fn new(handles: StoreHandles, config: &EngineConfig, owners: OwnerRegistry) -> Self {
        let telemetry = Telemetry::new(config.observability.metrics_enabled);
        let validator = Arc::new(SchemaValidator::new());

        Self {
            resolver: ContextResolver::new(handles.documents.clone()).with_telemetry(telemetry),
            batch: BatchResolver::new(
                handles.documents.clone(),
                config.resolver.batch_chunk_size
            )
            .with_telemetry(telemetry),
            documents: DocumentManager::new(handles.documents, validator, owners)
                .with_telemetry(telemetry),
            hierarchy: HierarchyManager::new(handles.hierarchy)
        }
    }

    /// Open the configured store backend and build an engine over it.
    pub async fn connect(
        config: &EngineConfig,
        owners: OwnerRegistry
    ) -> Result<Self, StorageError> {
        let handles = storage::open(&config.store).await?;
        info!(
            "Context engine connected to {} store (batch chunk size {})",
            config.store.backend, config.resolver.batch_chunk_size
        );
        Ok(Self::new(handles, config, owners))
    }

    pub async fn resolve<T>(&self, target: &T) -> Result<ResolvedContext, ResolveError>
    where
        T: ContextTarget + ?Sized
    {
        self.resolver.resolve(target).await
    }

    pub async fn resolve_many<T>(
        &self,
        targets: &[T]
    ) -> Result<BTreeMap<TargetId, Vec<MatchedDocument>>, ResolveError>
    where
        T: ContextTarget
    {
        self.batch.resolve_many(targets).await
    }

    pub async fn resolve_many_merged<T>(
        &self,
        targets: &[T]
    ) -> Result<BTreeMap<TargetId, ResolvedContext>, ResolveError>
    where
        T: ContextTarget
    {
        self.batch.resolve_many_merged(targets).await
    }

    pub async fn validate_document(
        &self,
        payload: &Value,
        schema: Option<SchemaId>
    ) -> Result<ValidationResult, DocumentError> {
        self.documents.validate_document(payload, schema).await
    }

    pub async fn reconcile_owned_documents<S>(
        &self,
        owner: &OwnerRef,
        desired_names: &[S]
    ) -> Result<Vec<String>, DocumentError>
    where
        S: AsRef<str>
    {
        self.documents
            .reconcile_owned_documents(owner, desired_names)
            .await
    }

    pub async fn sync_owned_documents(
        &self,
        owner: &OwnerRef,
        desired: Vec<DocumentDraft>
    ) -> Result<SyncReport, DocumentError> {
        self.documents.sync_owned_documents(owner, desired).await
    }

    /// Write path for documents, contracts and local overrides.
    pub fn documents(&self) -> &DocumentManager {
        &self.documents
    }

    pub fn hierarchy(&self) -> &HierarchyManager {
        &self.hierarchy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_core::{Device, Dimension, ScopeRestrictions};
    use serde_json::json;

    async fn engine() -> ContextEngine {
        let mut config = EngineConfig::default();
        config.observability.metrics_enabled = false;
        config.resolver.batch_chunk_size = 2;
        ContextEngine::connect(&config, OwnerRegistry::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_site_scenario() {
        let engine = engine().await;
        let schema = engine
            .documents()
            .create_schema(
                "net",
                "",
                json!({"type": "object", "properties": {"vlan": {"type": "integer"}}})
            )
            .await
            .unwrap();

        let base = engine
            .documents()
            .create_document(DocumentDraft::new("base", json!({"ntp": "1.1.1.1"})))
            .await
            .unwrap();
        let site_x = engine
            .documents()
            .create_document(
                DocumentDraft::new("site-x", json!({"ntp": "2.2.2.2", "vlan": 10}))
                    .with_weight(500)
                    .with_scope(ScopeRestrictions::default().with(Dimension::Site, ["X"]))
            )
            .await
            .unwrap();

        let mut device = Device::new("dev-1", "edge-1");
        device.site = Some("X".into());
        engine
            .documents()
            .set_local_override(&mut device, Some(json!({"vlan": 99})), Some(schema.id))
            .await
            .unwrap();

        let resolved = engine.resolve(&device).await.unwrap();
        assert_eq!(
            resolved.applied.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![site_x.id, base.id]
        );
        assert_eq!(
            Value::Object(resolved.data.clone()),
            json!({"ntp": "1.1.1.1", "vlan": 99})
        );

        let batch = engine.resolve_many(std::slice::from_ref(&device)).await.unwrap();
        let merged: Vec<_> = batch[&device.id].iter().map(|d| d.id).collect();
        assert_eq!(merged, vec![site_x.id, base.id]);

        let merged = engine
            .resolve_many_merged(std::slice::from_ref(&device))
            .await
            .unwrap();
        assert_eq!(merged[&device.id], resolved);
    }

    #[tokio::test]
    async fn test_hierarchy_edits_affect_resolution() {
        let engine = engine().await;
        engine
            .hierarchy()
            .add_region("emea", "EMEA", None)
            .await
            .unwrap();
        engine
            .hierarchy()
            .add_region("fra", "Frankfurt", None)
            .await
            .unwrap();
        engine
            .documents()
            .create_document(
                DocumentDraft::new("emea", json!({"tz": "CET"}))
                    .with_scope(ScopeRestrictions::default().with(Dimension::Region, ["emea"]))
            )
            .await
            .unwrap();

        let mut device = Device::new("dev-1", "fra-edge");
        device.region = Some("fra".into());
        assert!(engine.resolve(&device).await.unwrap().applied.is_empty());

        engine
            .hierarchy()
            .move_region(&"fra".into(), Some("emea".into()))
            .await
            .unwrap();
        assert_eq!(engine.resolve(&device).await.unwrap().applied.len(), 1);
    }
}
