//! Batch resolution of many targets.
//!
//! Targets are sent to the store in chunks, one correlated query per chunk.
//! Every input target is present in the result, with an empty list when
//! nothing matches, and each list is ordered exactly as the single-target
//! resolver orders it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use ctx_core::{ContextTarget, DocumentStore, ScopeAttributes, TargetId, sort_documents};
use errors::ResolveError;

use crate::telemetry::{ResolveTimer, Telemetry};
use crate::types::{MatchedDocument, ResolvedContext};

pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Clone)]
pub struct BatchResolver {
    store: Arc<dyn DocumentStore>,
    chunk_size: usize,
    telemetry: Telemetry
}

impl BatchResolver {
    pub fn new(store: Arc<dyn DocumentStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            telemetry: Telemetry::default()
        }
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Ordered matching documents per target, without merging.
    pub async fn resolve_many<T>(
        &self,
        targets: &[T]
    ) -> Result<BTreeMap<TargetId, Vec<MatchedDocument>>, ResolveError>
    where
        T: ContextTarget
    {
        let timer = ResolveTimer::new(self.telemetry, "resolve_many");
        let attributes: Vec<ScopeAttributes> =
            targets.iter().map(ContextTarget::scope_attributes).collect();
        let result = self.resolve_attributes(&attributes).await?;
        self.telemetry.record_batch(targets.len());
        timer.finish();
        Ok(result)
    }

    /// Full resolution per target: ordered documents merged, then the
    /// target's local override.
    pub async fn resolve_many_merged<T>(
        &self,
        targets: &[T]
    ) -> Result<BTreeMap<TargetId, ResolvedContext>, ResolveError>
    where
        T: ContextTarget
    {
        let mut matched = self.resolve_many(targets).await?;
        let mut resolved = BTreeMap::new();
        for target in targets {
            let id = target.target_id();
            if resolved.contains_key(id) {
                continue;
            }
            let documents = matched.remove(id).unwrap_or_default();
            let local_override = target.local_override().map(|o| &o.data);
            let context = ResolvedContext::from_layers(id.clone(), &documents, local_override);
            self.telemetry.record_resolve(target.kind(), context.applied.len());
            resolved.insert(id.clone(), context);
        }
        Ok(resolved)
    }

    pub async fn resolve_attributes(
        &self,
        attributes: &[ScopeAttributes]
    ) -> Result<BTreeMap<TargetId, Vec<MatchedDocument>>, ResolveError> {
        debug!(
            "Batch resolving {} target(s) in chunks of {}",
            attributes.len(),
            self.chunk_size
        );

        let mut result = BTreeMap::new();
        for (index, chunk) in attributes.chunks(self.chunk_size).enumerate() {
            trace!("Resolving chunk {} with {} target(s)", index, chunk.len());
            let found = self.store.find_matching_documents_batch(chunk).await?;
            for (target_id, mut documents) in found {
                sort_documents(&mut documents);
                result.insert(
                    target_id,
                    documents
                        .into_iter()
                        .map(MatchedDocument::from)
                        .collect::<Vec<_>>()
                );
            }
        }

        for target in attributes {
            result.entry(target.target_id.clone()).or_default();
        }

        debug!(
            "Batch resolved {} target(s), {} document match(es)",
            result.len(),
            result.values().map(Vec::len).sum::<usize>()
        );
        Ok(result)
    }
}
