//! # Context Engine Core
//!
//! Shared types and traits for the context resolution engine.
//!
//! This crate provides:
//! - The data model: scoped documents, schema contracts, targets, owners
//! - The region [`tree::TreeIndex`] with interval-based ancestor tests
//! - The matching predicate and document order ([`scope`]), declared once
//!   and shared by every execution strategy
//! - The store traits implemented by the `storage` crate

pub mod scope;
pub mod traits;
pub mod tree;
pub mod types;

pub use scope::{
    Dimension, MatchKind, ORDER_KEYS, OrderKey, ScopeAttributes, ScopeRestrictions, TargetValue,
    document_order, matches, sort_documents
};
pub use traits::{ContextTarget, DocumentStore, HierarchyStore};
pub use tree::{Placement, TreeIndex, TreeNode};
pub use types::{
    DEFAULT_WEIGHT, Device, DocumentDraft, DocumentId, JsonObject, LocalOverride, OwnerKind,
    OwnerRef, SchemaContract, SchemaId, ScopeRef, ScopedDocument, TargetEntity, TargetId,
    TargetKind, VirtualMachine, describe_owner, into_object
};
