//! Context resolution for network devices and virtual machines.
//!
//! The effective configuration of a target is computed by:
//!
//! 1. Selecting the active scoped documents whose restrictions the target
//!    satisfies on every dimension
//! 2. Ordering them by weight, then name, then id
//! 3. Deep-merging their payloads in that order
//! 4. Merging the target's local override last
//!
//! Batch resolution produces the same ordered lists for many targets with
//! one store query per chunk. Writes go through [`DocumentManager`], which
//! enforces payload shape, schema contracts, owner resolvability and
//! `(name, owner)` uniqueness.
//!
//! # Example
//!
//! ```rust,ignore
//! use context::{ContextEngine, OwnerRegistry};
//!
//! let engine = ContextEngine::connect(&config, OwnerRegistry::new()).await?;
//! let ctx = engine.resolve(&device).await?;
//! println!("{}", serde_json::Value::Object(ctx.data));
//! ```

mod batch;
mod engine;
mod hierarchy;
mod manager;
mod merge;
mod owners;
mod proptests;
mod reconcile;
mod resolver;
mod schema;
mod telemetry;
mod types;

pub use batch::{BatchResolver, DEFAULT_CHUNK_SIZE};
pub use engine::ContextEngine;
pub use hierarchy::HierarchyManager;
pub use manager::DocumentManager;
pub use merge::{deep_merge, merge_all};
pub use owners::{OwnerRegistry, OwnerResolver, StaticOwnerResolver};
pub use resolver::ContextResolver;
pub use schema::{SchemaValidator, ValidationResult};
pub use telemetry::{ResolveTimer, Telemetry};
pub use types::{AppliedDocument, ContextSource, MatchedDocument, ResolvedContext, SyncReport};
