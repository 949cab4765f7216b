//! # Context Engine Errors
//!
//! Error taxonomy for the context resolution engine.
//!
//! - Uses `thiserror` for structured error definitions
//! - Every variant carries named fields so messages stay greppable
//! - Write-time errors (`DocumentError`) are kept apart from collaborator
//!   failures (`StorageError`) because the read path only ever surfaces the
//!   latter

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which payload of a write failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadField {
    Data,
    LocalOverrideData
}

impl std::fmt::Display for PayloadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadField::Data => write!(f, "data"),
            PayloadField::LocalOverrideData => write!(f, "local_override_data")
        }
    }
}

/// A single schema violation: where in the payload and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub instance_path: String,
    pub message: String
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Write-time errors for scoped documents, schema contracts and local
/// overrides.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid payload shape: {field} must be a JSON object")]
    InvalidPayloadShape { field: PayloadField },

    #[error(
        "Schema validation of {field} against '{schema}' failed: {}",
        join_violations(.violations)
    )]
    SchemaValidationFailure {
        field: PayloadField,
        schema: String,
        violations: Vec<Violation>
    },

    #[error("Invalid schema definition '{name}': {reason}")]
    InvalidSchemaDefinition { name: String, reason: String },

    #[error("Duplicate document identity: name '{name}' already exists for owner {owner}")]
    DuplicateDocumentIdentity { name: String, owner: String },

    #[error("Duplicate schema contract name: {name}")]
    DuplicateSchemaName { name: String },

    #[error("Unresolvable owner: {owner}")]
    UnresolvableOwner { owner: String },

    #[error("Missing schema contract: {schema_id}")]
    MissingSchemaContract { schema_id: String },

    #[error("Schema contract '{name}' is still referenced by {documents} document(s)")]
    SchemaInUse { name: String, documents: usize },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    #[error("Local override schema set without local override data")]
    OrphanedOverrideSchema,

    #[error(transparent)]
    Storage(#[from] StorageError)
}

/// Read-path errors. Resolution never fails on well-formed stored data, so
/// the only failure is the collaborator itself.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Storage(#[from] StorageError)
}

/// Region hierarchy errors raised by the tree index on structural edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("Unknown hierarchy node: {id}")]
    UnknownNode { id: String },

    #[error("Hierarchy node already exists: {id}")]
    DuplicateNode { id: String },

    #[error("Moving {id} under {parent} would create a cycle")]
    HierarchyCycle { id: String, parent: String },

    #[error("Hierarchy node {id} still has {children} child node(s)")]
    NodeHasChildren { id: String, children: usize }
}

/// Failure of a hierarchy edit that is persisted through a store.
#[derive(Debug, Error)]
pub enum HierarchyUpdateError {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Storage(#[from] StorageError)
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection to {backend} failed: {reason}")]
    ConnectionError { backend: String, reason: String },

    #[error("Query on {backend} failed: {reason}")]
    QueryError { backend: String, reason: String },

    #[error("Serialization error: {error_type} - {reason}")]
    SerializationError { error_type: String, reason: String },

    #[error("Not found on {backend}:{id}")]
    NotFound { backend: String, id: String },

    #[error("Transaction on {backend} failed: {reason}")]
    TransactionError { backend: String, reason: String }
}

impl From<HierarchyError> for StorageError {
    fn from(err: HierarchyError) -> Self {
        StorageError::SerializationError {
            error_type: "hierarchy".to_string(),
            reason: err.to_string()
        }
    }
}
