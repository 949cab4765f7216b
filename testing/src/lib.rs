//! Shared test fixtures for the context resolution engine workspace.
//!
//! Provides a single, shared PostgreSQL testcontainer across all test files
//! plus builders for documents, devices and region trees.
//!
//! The container is lazily initialized once per test process and
//! automatically cleaned up when the process exits.

mod builders;
mod fixtures;

pub use builders::*;
pub use fixtures::*;
