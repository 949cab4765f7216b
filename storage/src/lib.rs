//! # Storage Layer
//!
//! Document Store backends (in-memory, PostgreSQL) and the SQL rendering of
//! the shared matching predicate.

pub mod memory;
pub mod postgres;
pub mod sql;

use std::sync::Arc;

use config::StoreConfig;
use ctx_core::{DocumentStore, HierarchyStore};
use errors::StorageError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Both store roles, backed by the same backend instance.
#[derive(Clone)]
pub struct StoreHandles {
    pub documents: Arc<dyn DocumentStore>,
    pub hierarchy: Arc<dyn HierarchyStore>
}

impl StoreHandles {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: DocumentStore + HierarchyStore + 'static
    {
        Self {
            documents: backend.clone(),
            hierarchy: backend
        }
    }
}

/// Open the backend selected by `config.backend`. PostgreSQL schemas are
/// created when missing.
pub async fn open(config: &StoreConfig) -> Result<StoreHandles, StorageError> {
    if config.is_postgres() {
        let store = PostgresStore::from_config(&config.postgres).await?;
        store.initialize_schema().await?;
        Ok(StoreHandles::from_backend(Arc::new(store)))
    } else {
        Ok(StoreHandles::from_backend(Arc::new(InMemoryStore::new())))
    }
}
