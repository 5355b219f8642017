//! In-process document store

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use kubefate_core::{document::keys, Document, Filter, StoreResult};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{document_uuid, Store, UniqueIndex};

type Records = BTreeMap<String, Document>;

/// Collections of documents held in memory behind a single lock.
///
/// Index checks and the write they guard happen under the same write lock,
/// so two racing writers cannot both pass a unique index.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Records>>,
    indexes: HashMap<String, Vec<UniqueIndex>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce `index` on every write to `collection`
    #[must_use]
    pub fn with_index(mut self, collection: impl Into<String>, index: UniqueIndex) -> Self {
        self.indexes.entry(collection.into()).or_default().push(index);
        self
    }

    /// Number of documents in a collection
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// True if the collection holds no documents
    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    fn check_indexes(
        &self,
        collection: &str,
        records: &Records,
        uuid: &str,
        doc: &Document,
    ) -> StoreResult<()> {
        self.indexes
            .get(collection)
            .into_iter()
            .flatten()
            .try_for_each(|index| index.check(records, uuid, doc))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let found = match filter.pinned(keys::UUID).and_then(Value::as_str) {
            Some(uuid) => records
                .get(uuid)
                .filter(|doc| filter.matches(doc))
                .cloned()
                .into_iter()
                .collect(),
            None => records
                .values()
                .filter(|doc| filter.matches(doc))
                .cloned()
                .collect(),
        };
        Ok(found)
    }

    async fn update_by_uuid(&self, collection: &str, doc: Document) -> StoreResult<()> {
        let uuid = document_uuid(&doc)?.to_string();
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();

        self.check_indexes(collection, records, &uuid, &doc)?;
        records.insert(uuid.clone(), doc);
        debug!(collection, uuid = %uuid, "upserted document");
        Ok(())
    }

    async fn compare_and_update(
        &self,
        collection: &str,
        doc: Document,
        guard: &Filter,
    ) -> StoreResult<bool> {
        let uuid = document_uuid(&doc)?.to_string();
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(false);
        };

        if !records.get(&uuid).is_some_and(|current| guard.matches(current)) {
            return Ok(false);
        }

        self.check_indexes(collection, records, &uuid, &doc)?;
        records.insert(uuid.clone(), doc);
        debug!(collection, uuid = %uuid, "replaced document");
        Ok(true)
    }
}
