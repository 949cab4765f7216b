use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ctx_core::{DocumentId, JsonObject, ScopedDocument, TargetId};

/// Where a top-level key of a resolved context got its final value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ContextSource {
    Document { id: DocumentId, name: String },
    LocalOverride
}

impl std::fmt::Display for ContextSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextSource::Document { id, name } => write!(f, "document:{name} ({id})"),
            ContextSource::LocalOverride => write!(f, "local-override")
        }
    }
}

/// A document that contributed to a resolved context, in merge order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDocument {
    pub id: DocumentId,
    pub name: String,
    pub weight: i32
}

impl From<&ScopedDocument> for AppliedDocument {
    fn from(document: &ScopedDocument) -> Self {
        Self {
            id: document.id,
            name: document.name.clone(),
            weight: document.weight
        }
    }
}

/// A matching document and its payload, as returned by batch resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedDocument {
    pub id: DocumentId,
    pub name: String,
    pub weight: i32,
    pub data: JsonObject
}

impl From<ScopedDocument> for MatchedDocument {
    fn from(document: ScopedDocument) -> Self {
        Self {
            id: document.id,
            name: document.name,
            weight: document.weight,
            data: document.data
        }
    }
}

impl MatchedDocument {
    pub fn applied(&self) -> AppliedDocument {
        AppliedDocument {
            id: self.id,
            name: self.name.clone(),
            weight: self.weight
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContext {
    pub target_id: TargetId,
    /// Effective configuration after documents and the local override.
    pub data: JsonObject,
    pub applied: Vec<AppliedDocument>,
    pub override_applied: bool,
    /// Last writer of every top-level key of `data`.
    pub provenance: BTreeMap<String, ContextSource>
}

impl ResolvedContext {
    /// Build the result from ordered matches, tracking which source last
    /// wrote each top-level key.
    pub(crate) fn from_layers(
        target_id: TargetId,
        documents: &[MatchedDocument],
        local_override: Option<&JsonObject>
    ) -> Self {
        let mut provenance = BTreeMap::new();
        for document in documents {
            for key in document.data.keys() {
                provenance.insert(
                    key.clone(),
                    ContextSource::Document {
                        id: document.id,
                        name: document.name.clone()
                    }
                );
            }
        }
        if let Some(data) = local_override {
            for key in data.keys() {
                provenance.insert(key.clone(), ContextSource::LocalOverride);
            }
        }

        let merged = crate::merge::merge_all(documents.iter().map(|d| &d.data));
        let data = match local_override {
            Some(overlay) => crate::merge::deep_merge(&merged, overlay),
            None => merged
        };

        Self {
            target_id,
            data,
            applied: documents.iter().map(MatchedDocument::applied).collect(),
            override_applied: local_override.is_some(),
            provenance
        }
    }

    /// `(key, value, source)` for every top-level key, sorted by key.
    pub fn explain(&self) -> Vec<(String, String, String)> {
        let mut explanations: Vec<_> = self
            .data
            .iter()
            .map(|(key, value)| {
                let source = self
                    .provenance
                    .get(key)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                (key.clone(), value.to_string(), source)
            })
            .collect();
        explanations.sort_by(|a, b| a.0.cmp(&b.0));
        explanations
    }

    pub fn source_of(&self, key: &str) -> Option<&ContextSource> {
        self.provenance.get(key)
    }
}

/// Counts produced by one owner synchronisation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}
