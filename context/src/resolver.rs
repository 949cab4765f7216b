//! Single-target context resolution.
//!
//! Resolution for one target:
//! 1. Query the store for active documents matching the target's scope
//! 2. Order them by weight, then name, then id
//! 3. Merge the payloads in that order, later documents winning
//! 4. Merge the target's local override last
//!
//! The override was validated when it was written, so nothing is validated
//! here. Resolution never writes and takes no locks.

use std::sync::Arc;

use tracing::{debug, trace};

use ctx_core::{ContextTarget, DocumentStore, ScopeAttributes, sort_documents};
use errors::ResolveError;

use crate::telemetry::{ResolveTimer, Telemetry};
use crate::types::{MatchedDocument, ResolvedContext};

/// Resolves the effective configuration of one target at a time.
///
/// # Example
///
/// ```rust,ignore
/// use context::ContextResolver;
///
/// let resolver = ContextResolver::new(store);
/// let ctx = resolver.resolve(&device).await?;
/// for (key, value, source) in ctx.explain() {
///     println!("{key} = {value} (from {source})");
/// }
/// ```
#[derive(Clone)]
pub struct ContextResolver {
    store: Arc<dyn DocumentStore>,
    telemetry: Telemetry
}

impl ContextResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            telemetry: Telemetry::default()
        }
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub async fn resolve<T>(&self, target: &T) -> Result<ResolvedContext, ResolveError>
    where
        T: ContextTarget + ?Sized
    {
        let timer = ResolveTimer::new(self.telemetry, "resolve");
        let attributes = target.scope_attributes();
        debug!("Resolving context for {} {}", target.kind(), attributes.target_id);

        let documents = self.ordered_documents(&attributes).await?;
        let local_override = target.local_override().map(|o| &o.data);
        let resolved =
            ResolvedContext::from_layers(attributes.target_id, &documents, local_override);

        debug!(
            "Resolved {} with {} document(s), override applied: {}",
            resolved.target_id,
            resolved.applied.len(),
            resolved.override_applied
        );
        self.telemetry
            .record_resolve(target.kind(), resolved.applied.len());
        timer.finish();

        Ok(resolved)
    }

    /// Matching documents for `attributes` in merge order.
    pub async fn ordered_documents(
        &self,
        attributes: &ScopeAttributes
    ) -> Result<Vec<MatchedDocument>, ResolveError> {
        let mut documents = self.store.find_matching_documents(attributes).await?;
        sort_documents(&mut documents);
        trace!(
            "Ordered documents for {}: {:?}",
            attributes.target_id,
            documents.iter().map(|d| d.name.as_str()).collect::<Vec<_>>()
        );
        Ok(documents.into_iter().map(MatchedDocument::from).collect())
    }
}
