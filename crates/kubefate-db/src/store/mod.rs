//! Document store collaborator.
//!
//! A store holds named collections of JSON documents keyed by their `uuid`
//! field. Two backends ship with the crate:
//! - [`MemoryStore`]: process-local, used by tests and single-node setups
//! - [`SqliteStore`]: `SQLx`-backed, one table of JSON bodies
//!
//! Both support partial unique indexes so the active-name uniqueness of
//! clusters can be enforced at the store layer.

use async_trait::async_trait;
use kubefate_core::{document::keys, Document, Filter, StoreError, StoreResult};

mod index;
mod memory;
mod sqlite;

pub use index::UniqueIndex;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Collection-scoped find/update primitives the repository is built on.
///
/// Implementations are shared across tasks and must serialize concurrent
/// writes themselves. Dropping a returned future abandons the operation.
#[async_trait]
pub trait Store: Send + Sync {
    /// All documents in `collection` matching `filter`, in no particular order
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Any one document matching `filter`
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    /// Insert or replace the document with the same `uuid`.
    ///
    /// Fails with `StoreError::Conflict` if a unique index would be violated.
    async fn update_by_uuid(&self, collection: &str, doc: Document) -> StoreResult<()>;

    /// Replace the document with the same `uuid` only if the stored version
    /// matches `guard`. Returns `false` when there is no such document or the
    /// guard does not hold; never inserts.
    async fn compare_and_update(
        &self,
        collection: &str,
        doc: Document,
        guard: &Filter,
    ) -> StoreResult<bool>;
}

/// The `uuid` key of a document about to be written
pub(crate) fn document_uuid(doc: &Document) -> StoreResult<&str> {
    doc.get(keys::UUID)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| StoreError::codec(format!("document has no string '{}'", keys::UUID)))
}
