//! `SQLite` document store using `SQLx`
//!
//! Every collection shares one `documents` table keyed by
//! `(collection, uuid)`. Bodies are stored as JSON text; unique indexes are
//! expression indexes over `json_extract`.
//!
//! Filters are rendered to SQL for `find`, the compare-and-update guard and
//! partial indexes alike, with JSON types compared alongside values so the
//! result agrees with `Filter::matches`. Filters on arrays or objects cannot
//! be rendered and are evaluated in process after the rows are read.

use std::path::Path;

use async_trait::async_trait;
use kubefate_core::{document::keys, Document, Filter, StoreResult};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::debug;

use super::{document_uuid, Store, UniqueIndex};

mod query;
mod schema;

/// Document store backed by an `SQLite` connection pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `db_url` and create the schema if missing
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the database cannot be opened or the
    /// schema cannot be created
    pub async fn connect(db_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = schema::create_connection_pool(db_url, max_connections).await?;
        schema::init_schema(&pool).await?;
        debug!(db_url, max_connections, "opened sqlite store");
        Ok(Self { pool })
    }

    /// Open or create a database file at `path`
    ///
    /// # Errors
    ///
    /// Same as [`SqliteStore::connect`]
    pub async fn open(path: &Path) -> StoreResult<Self> {
        Self::connect(&format!("sqlite:{}?mode=rwc", path.display()), 5).await
    }

    /// Create a partial unique index over documents of `collection`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the index definition cannot be
    /// rendered, or `StoreError::Conflict` if existing rows already violate it
    pub async fn create_index(&self, collection: &str, index: &UniqueIndex) -> StoreResult<()> {
        let ddl = schema::index_ddl(collection, index)?;
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| query::storage_error("Failed to create index", e))?;
        debug!(collection, index = index.name(), "created unique index");
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let uuid = filter.pinned(keys::UUID).and_then(Value::as_str);
        match schema::predicate(filter) {
            Ok(clause) => query::select_bodies(&self.pool, collection, uuid, Some(&clause)).await,
            // structured values and unusual field names stay in process
            Err(_) => {
                let docs = query::select_bodies(&self.pool, collection, uuid, None).await?;
                Ok(docs.into_iter().filter(|doc| filter.matches(doc)).collect())
            }
        }
    }

    async fn update_by_uuid(&self, collection: &str, doc: Document) -> StoreResult<()> {
        let uuid = document_uuid(&doc)?;
        query::upsert(&self.pool, collection, uuid, &doc).await?;
        debug!(collection, uuid, "upserted document");
        Ok(())
    }

    async fn compare_and_update(
        &self,
        collection: &str,
        doc: Document,
        guard: &Filter,
    ) -> StoreResult<bool> {
        let uuid = document_uuid(&doc)?;
        let applied = query::replace_if(&self.pool, collection, uuid, &doc, guard).await?;
        debug!(collection, uuid, applied, "compare and update");
        Ok(applied)
    }
}
