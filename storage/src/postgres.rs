use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{AssertSqlSafe, Pool, Postgres, Row};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use config::PostgresConfig;
use ctx_core::{
    Dimension, DocumentId, DocumentStore, HierarchyStore, OwnerKind, OwnerRef, Placement,
    SchemaContract, SchemaId, ScopeAttributes, ScopeRef, ScopeRestrictions, ScopedDocument,
    TargetId, TargetValue, TreeIndex, TreeNode
};
use errors::StorageError;

use crate::sql::{
    DOCUMENT_COLUMNS, DOCUMENTS_TABLE, batch_query, restriction_column, single_target_query
};

const BACKEND: &str = "postgres";

fn query_error(err: sqlx::Error) -> StorageError {
    StorageError::QueryError {
        backend: BACKEND.to_string(),
        reason: err.to_string()
    }
}

fn decode_error(error_type: &str, reason: impl ToString) -> StorageError {
    StorageError::SerializationError {
        error_type: error_type.to_string(),
        reason: reason.to_string()
    }
}

fn scope_values(values: &std::collections::BTreeSet<ScopeRef>) -> Vec<String> {
    values.iter().map(|v| v.as_str().to_string()).collect()
}

macro_rules! bind_document {
    ($query:expr, $doc:expr) => {{
        let doc: &ScopedDocument = $doc;
        let mut query = $query
            .bind(doc.id.as_uuid())
            .bind(doc.name.clone())
            .bind(doc.weight)
            .bind(doc.description.clone())
            .bind(doc.is_active)
            .bind(serde_json::Value::Object(doc.data.clone()))
            .bind(doc.schema.map(|s| s.as_uuid()))
            .bind(doc.owner.as_ref().map(|o| o.kind.to_string()))
            .bind(doc.owner.as_ref().map(|o| o.id.clone()));
        for dimension in Dimension::ALL {
            query = query.bind(scope_values(doc.scope.get(dimension)));
        }
        query
    }};
}

/// PostgreSQL Document Store.
///
/// Matching runs entirely in SQL. The region test joins the persisted tree
/// placements, so `replace_tree` must be called after every hierarchy edit.
pub struct PostgresStore {
    pool: Pool<Postgres>,
    single_query: String,
    batch_query: String,
    insert_query: String,
    update_query: String,
    select_query: String
}

impl PostgresStore {
    pub async fn new(connection_url: &str) -> Result<Self, StorageError> {
        let pool = Pool::connect(connection_url)
            .await
            .map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                reason: e.to_string()
            })?;
        Ok(Self::from_pool(pool))
    }

    pub async fn from_config(config: &PostgresConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.timeout_seconds))
            .connect(&config.connection_url())
            .await
            .map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                reason: e.to_string()
            })?;
        info!(
            "Connected to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        let columns = DOCUMENT_COLUMNS.join(", ");
        let placeholders = (1..=DOCUMENT_COLUMNS.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = DOCUMENT_COLUMNS
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| format!("{} = ${}", c, i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            pool,
            single_query: single_target_query(),
            batch_query: batch_query(),
            insert_query: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                DOCUMENTS_TABLE, columns, placeholders
            ),
            update_query: format!(
                "UPDATE {} SET {} WHERE id = $1",
                DOCUMENTS_TABLE, assignments
            ),
            select_query: format!("SELECT {} FROM {}", columns, DOCUMENTS_TABLE)
        }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    pub async fn initialize_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_contracts (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                schema JSONB NOT NULL
            )"
        )
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS context_documents (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                weight INTEGER NOT NULL DEFAULT 1000,
                description TEXT NOT NULL DEFAULT '',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                data JSONB NOT NULL,
                schema_id UUID REFERENCES schema_contracts(id),
                owner_kind TEXT,
                owner_id TEXT,
                regions TEXT[] NOT NULL DEFAULT '{}',
                sites TEXT[] NOT NULL DEFAULT '{}',
                roles TEXT[] NOT NULL DEFAULT '{}',
                device_types TEXT[] NOT NULL DEFAULT '{}',
                platforms TEXT[] NOT NULL DEFAULT '{}',
                cluster_groups TEXT[] NOT NULL DEFAULT '{}',
                clusters TEXT[] NOT NULL DEFAULT '{}',
                tenant_groups TEXT[] NOT NULL DEFAULT '{}',
                tenants TEXT[] NOT NULL DEFAULT '{}',
                tags TEXT[] NOT NULL DEFAULT '{}',
                CHECK (jsonb_typeof(data) = 'object'),
                CHECK ((owner_kind IS NULL) = (owner_id IS NULL))
            )"
        )
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_context_documents_identity
             ON context_documents (name, COALESCE(owner_kind, ''), COALESCE(owner_id, ''))"
        )
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_context_documents_owner
             ON context_documents (owner_kind, owner_id)"
        )
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scope_tree_nodes (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                parent_id TEXT,
                tree_id BIGINT NOT NULL,
                lft BIGINT NOT NULL,
                rght BIGINT NOT NULL
            )"
        )
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scope_tree_nodes_bounds
             ON scope_tree_nodes (tree_id, lft, rght)"
        )
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    fn document_from_row(row: &PgRow) -> Result<ScopedDocument, StorageError> {
        let data = match row.try_get::<serde_json::Value, _>("data").map_err(query_error)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(decode_error(
                    "document",
                    format!("data column holds a non-object value: {}", other)
                ));
            }
        };

        let owner_kind: Option<String> = row.try_get("owner_kind").map_err(query_error)?;
        let owner_id: Option<String> = row.try_get("owner_id").map_err(query_error)?;
        let owner = match (owner_kind, owner_id) {
            (Some(kind), Some(id)) => {
                let kind = kind
                    .parse::<OwnerKind>()
                    .map_err(|e| decode_error("owner_kind", format!("{}: {}", kind, e)))?;
                Some(OwnerRef::new(kind, id))
            }
            _ => None
        };

        let mut scope = ScopeRestrictions::default();
        for dimension in Dimension::ALL {
            let values: Vec<String> = row
                .try_get(restriction_column(dimension))
                .map_err(query_error)?;
            *scope.get_mut(dimension) = values.into_iter().map(ScopeRef::from).collect();
        }

        let schema: Option<uuid::Uuid> = row.try_get("schema_id").map_err(query_error)?;

        Ok(ScopedDocument {
            id: DocumentId::from_uuid(row.try_get("id").map_err(query_error)?),
            name: row.try_get("name").map_err(query_error)?,
            weight: row.try_get("weight").map_err(query_error)?,
            description: row.try_get("description").map_err(query_error)?,
            is_active: row.try_get("is_active").map_err(query_error)?,
            data,
            schema: schema.map(SchemaId::from_uuid),
            owner,
            scope
        })
    }

    fn schema_from_row(row: &PgRow) -> Result<SchemaContract, StorageError> {
        Ok(SchemaContract {
            id: SchemaId::from_uuid(row.try_get("id").map_err(query_error)?),
            name: row.try_get("name").map_err(query_error)?,
            description: row.try_get("description").map_err(query_error)?,
            schema: row.try_get("schema").map_err(query_error)?
        })
    }

    fn documents_from_rows(rows: &[PgRow]) -> Result<Vec<ScopedDocument>, StorageError> {
        rows.iter().map(Self::document_from_row).collect()
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find_matching_documents(
        &self,
        target: &ScopeAttributes
    ) -> Result<Vec<ScopedDocument>, StorageError> {
        let mut query = sqlx::query(AssertSqlSafe(self.single_query.as_str()));
        for dimension in Dimension::ALL {
            query = match target.value(dimension) {
                TargetValue::Single(value) => query.bind(value.map(|v| v.as_str().to_string())),
                TargetValue::Set(values) => query.bind(scope_values(values))
            };
        }

        let rows = query.fetch_all(&self.pool).await.map_err(query_error)?;
        debug!("{} documents match target {}", rows.len(), target.target_id);
        Self::documents_from_rows(&rows)
    }

    async fn find_matching_documents_batch(
        &self,
        targets: &[ScopeAttributes]
    ) -> Result<BTreeMap<TargetId, Vec<ScopedDocument>>, StorageError> {
        let mut result: BTreeMap<TargetId, Vec<ScopedDocument>> = BTreeMap::new();
        let mut distinct = Vec::with_capacity(targets.len());
        for target in targets {
            if !result.contains_key(&target.target_id) {
                result.insert(target.target_id.clone(), Vec::new());
                distinct.push(target);
            }
        }
        if distinct.is_empty() {
            return Ok(result);
        }

        let records =
            serde_json::to_value(&distinct).map_err(|e| decode_error("batch_targets", e))?;
        let rows = sqlx::query(AssertSqlSafe(self.batch_query.as_str()))
            .bind(records)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        debug!(
            "Batch query for {} targets returned {} rows",
            distinct.len(),
            rows.len()
        );

        for row in &rows {
            let target_id: String = row.try_get("target_id").map_err(query_error)?;
            let document = Self::document_from_row(row)?;
            result
                .entry(TargetId::from(target_id))
                .or_default()
                .push(document);
        }
        Ok(result)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<ScopedDocument>, StorageError> {
        let sql = format!("{} WHERE id = $1", self.select_query);
        let row = sqlx::query(AssertSqlSafe(sql.as_str()))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;
        row.as_ref().map(Self::document_from_row).transpose()
    }

    async fn find_document_by_identity(
        &self,
        name: &str,
        owner: Option<&OwnerRef>
    ) -> Result<Option<ScopedDocument>, StorageError> {
        let sql = format!(
            "{} WHERE name = $1 AND owner_kind IS NOT DISTINCT FROM $2 \
             AND owner_id IS NOT DISTINCT FROM $3",
            self.select_query
        );
        let row = sqlx::query(AssertSqlSafe(sql.as_str()))
            .bind(name)
            .bind(owner.map(|o| o.kind.to_string()))
            .bind(owner.map(|o| o.id.clone()))
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;
        row.as_ref().map(Self::document_from_row).transpose()
    }

    async fn list_documents(&self) -> Result<Vec<ScopedDocument>, StorageError> {
        let sql = format!(
            "{} ORDER BY weight ASC, name COLLATE \"C\" ASC, id ASC",
            self.select_query
        );
        let rows = sqlx::query(AssertSqlSafe(sql.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        Self::documents_from_rows(&rows)
    }

    async fn list_owned_documents(
        &self,
        owner: &OwnerRef
    ) -> Result<Vec<ScopedDocument>, StorageError> {
        let sql = format!(
            "{} WHERE owner_kind = $1 AND owner_id = $2 \
             ORDER BY weight ASC, name COLLATE \"C\" ASC, id ASC",
            self.select_query
        );
        let rows = sqlx::query(AssertSqlSafe(sql.as_str()))
            .bind(owner.kind.to_string())
            .bind(owner.id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        Self::documents_from_rows(&rows)
    }

    async fn count_documents_with_schema(&self, schema: SchemaId) -> Result<usize, StorageError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM context_documents WHERE schema_id = $1")
                .bind(schema.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(query_error)?;
        usize::try_from(count).map_err(|e| decode_error("count", e))
    }

    async fn insert_document(&self, document: &ScopedDocument) -> Result<(), StorageError> {
        bind_document!(sqlx::query(AssertSqlSafe(self.insert_query.as_str())), document)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn update_document(&self, document: &ScopedDocument) -> Result<(), StorageError> {
        let result =
            bind_document!(sqlx::query(AssertSqlSafe(self.update_query.as_str())), document)
                .execute(&self.pool)
                .await
                .map_err(query_error)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                backend: BACKEND.to_string(),
                id: document.id.to_string()
            });
        }
        Ok(())
    }

    async fn delete_document(&self, id: DocumentId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM context_documents WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_schema(&self, id: SchemaId) -> Result<Option<SchemaContract>, StorageError> {
        let row =
            sqlx::query("SELECT id, name, description, schema FROM schema_contracts WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;
        row.as_ref().map(Self::schema_from_row).transpose()
    }

    async fn find_schema_by_name(
        &self,
        name: &str
    ) -> Result<Option<SchemaContract>, StorageError> {
        let row = sqlx::query(
            "SELECT id, name, description, schema FROM schema_contracts WHERE name = $1"
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;
        row.as_ref().map(Self::schema_from_row).transpose()
    }

    async fn insert_schema(&self, schema: &SchemaContract) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO schema_contracts (id, name, description, schema) VALUES ($1, $2, $3, $4)"
        )
        .bind(schema.id.as_uuid())
        .bind(&schema.name)
        .bind(&schema.description)
        .bind(&schema.schema)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn update_schema(&self, schema: &SchemaContract) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE schema_contracts SET name = $2, description = $3, schema = $4 WHERE id = $1"
        )
        .bind(schema.id.as_uuid())
        .bind(&schema.name)
        .bind(&schema.description)
        .bind(&schema.schema)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                backend: BACKEND.to_string(),
                id: schema.id.to_string()
            });
        }
        Ok(())
    }

    async fn delete_schema(&self, id: SchemaId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM schema_contracts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl HierarchyStore for PostgresStore {
    async fn load_tree(&self) -> Result<TreeIndex, StorageError> {
        let rows =
            sqlx::query("SELECT id, name, parent_id, tree_id, lft, rght FROM scope_tree_nodes")
                .fetch_all(&self.pool)
                .await
                .map_err(query_error)?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in &rows {
            let bound = |column: &str| -> Result<u32, StorageError> {
                let value: i64 = row.try_get(column).map_err(query_error)?;
                u32::try_from(value).map_err(|e| decode_error("tree_placement", e))
            };
            let parent: Option<String> = row.try_get("parent_id").map_err(query_error)?;
            nodes.push(TreeNode {
                id: ScopeRef::from(row.try_get::<String, _>("id").map_err(query_error)?),
                name: row.try_get("name").map_err(query_error)?,
                parent: parent.map(ScopeRef::from),
                placement: Placement {
                    tree_id: bound("tree_id")?,
                    left: bound("lft")?,
                    right: bound("rght")?
                }
            });
        }
        Ok(TreeIndex::from_placed_nodes(nodes))
    }

    async fn replace_tree(&self, tree: &TreeIndex) -> Result<(), StorageError> {
        let transaction_error = |e: sqlx::Error| StorageError::TransactionError {
            backend: BACKEND.to_string(),
            reason: e.to_string()
        };

        let mut tx = self.pool.begin().await.map_err(transaction_error)?;
        sqlx::query("DELETE FROM scope_tree_nodes")
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        for node in tree.nodes() {
            sqlx::query(
                "INSERT INTO scope_tree_nodes (id, name, parent_id, tree_id, lft, rght)
                 VALUES ($1, $2, $3, $4, $5, $6)"
            )
            .bind(node.id.as_str())
            .bind(&node.name)
            .bind(node.parent.as_ref().map(|p| p.as_str().to_string()))
            .bind(i64::from(node.placement.tree_id))
            .bind(i64::from(node.placement.left))
            .bind(i64::from(node.placement.right))
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        tx.commit().await.map_err(transaction_error)?;
        info!("Replaced region hierarchy with {} nodes", tree.len());
        Ok(())
    }
}
