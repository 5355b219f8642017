// Integration tests have relaxed clippy settings
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Repository behaviour that the shipped backends cannot produce on their
//! own: duplicated uuids, stores that never answer, failing writes.
//! Also holds the property test for active-name uniqueness.

mod common;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use common::{cluster, NAMESPACE};
use kubefate_core::{
    to_document, ClusterStatus, Document, Error, Filter, StoreError, StoreResult,
};
use kubefate_db::{ClusterRepository, MemoryStore, Store, UniqueIndex};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

/// Answers every query with each match twice
struct DuplicatingStore(MemoryStore);

#[async_trait]
impl Store for DuplicatingStore {
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let docs = self.0.find(collection, filter).await?;
        Ok(docs.iter().chain(docs.iter()).cloned().collect())
    }

    async fn update_by_uuid(&self, collection: &str, doc: Document) -> StoreResult<()> {
        self.0.update_by_uuid(collection, doc).await
    }

    async fn compare_and_update(
        &self,
        collection: &str,
        doc: Document,
        guard: &Filter,
    ) -> StoreResult<bool> {
        self.0.compare_and_update(collection, doc, guard).await
    }
}

/// Never completes a call
struct HangingStore;

#[async_trait]
impl Store for HangingStore {
    async fn find(&self, _collection: &str, _filter: &Filter) -> StoreResult<Vec<Document>> {
        futures::future::pending().await
    }

    async fn update_by_uuid(&self, _collection: &str, _doc: Document) -> StoreResult<()> {
        futures::future::pending().await
    }

    async fn compare_and_update(
        &self,
        _collection: &str,
        _doc: Document,
        _guard: &Filter,
    ) -> StoreResult<bool> {
        futures::future::pending().await
    }
}

/// Reads succeed, writes fail with a backend error
struct ReadOnlyStore(MemoryStore);

#[async_trait]
impl Store for ReadOnlyStore {
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.0.find(collection, filter).await
    }

    async fn update_by_uuid(&self, _collection: &str, _doc: Document) -> StoreResult<()> {
        Err(StoreError::backend("database is read only"))
    }

    async fn compare_and_update(
        &self,
        _collection: &str,
        _doc: Document,
        _guard: &Filter,
    ) -> StoreResult<bool> {
        Err(StoreError::backend("database is read only"))
    }
}

#[tokio::test]
async fn duplicated_uuid_is_corruption() {
    common::init_tracing();
    let store = MemoryStore::new();
    let record = cluster("fate-9999");
    store
        .update_by_uuid("cluster", to_document(&record))
        .await
        .unwrap();

    let repo = ClusterRepository::new(Arc::new(DuplicatingStore(store)));
    let result = repo
        .find_by_uuid(&CancellationToken::new(), &record.uuid())
        .await;
    assert!(matches!(result, Err(Error::Corrupted(_))), "{result:?}");
}

#[tokio::test]
async fn cancellation_interrupts_a_pending_call() {
    common::init_tracing();
    let store: Arc<dyn Store> = Arc::new(HangingStore);
    let repo = ClusterRepository::new(store);
    let token = CancellationToken::new();

    let lookup = {
        let repo = repo.clone();
        let token = token.clone();
        tokio::spawn(async move { repo.exists_active(&token, "fate-9999", NAMESPACE).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), lookup)
        .await
        .expect("cancelled call should return promptly")
        .expect("lookup task panicked");
    assert!(matches!(result, Err(Error::Cancelled)), "{result:?}");
}

#[tokio::test]
async fn store_failures_surface_unchanged() {
    common::init_tracing();
    let seeded = MemoryStore::new();
    let record = cluster("fate-9999");
    seeded
        .update_by_uuid("cluster", to_document(&record))
        .await
        .unwrap();
    let repo = ClusterRepository::new(Arc::new(ReadOnlyStore(seeded)));
    let token = CancellationToken::new();

    let result = repo.create(&token, &cluster("fate-10000")).await;
    assert!(
        matches!(result, Err(Error::Storage(StoreError::Backend(_)))),
        "{result:?}"
    );

    let result = repo.soft_delete(&token, &record.uuid()).await;
    assert!(
        matches!(result, Err(Error::Storage(StoreError::Backend(_)))),
        "{result:?}"
    );
    let stored = repo.find_by_uuid(&token, &record.uuid()).await.unwrap();
    assert_eq!(stored.status, ClusterStatus::Creating);
}

// ============================================================================
// PROPERTY: at most one non-deleted record per (name, namespace)
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Create(usize),
    Delete(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0_usize..3).prop_map(Op::Create),
        (0_usize..3).prop_map(Op::Delete),
    ]
}

const NAMES: [&str; 3] = ["fate-9999", "fate-10000", "fate-exchange"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_index_keeps_one_active_record_per_name(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let outcome: Result<(), TestCaseError> = tokio_test::block_on(async {
            let store = MemoryStore::new().with_index("cluster", UniqueIndex::active_cluster_name());
            let repo = ClusterRepository::new(Arc::new(store));
            let token = CancellationToken::new();

            for op in ops {
                match op {
                    Op::Create(i) => {
                        let taken = repo.exists_active(&token, NAMES[i], NAMESPACE).await
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        let result = repo.create(&token, &cluster(NAMES[i])).await;
                        prop_assert_eq!(result.is_ok(), !taken, "{:?}", result);
                    }
                    Op::Delete(i) => {
                        let active = repo.list_clusters(&token, false).await
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        if let Some(target) = active.iter().find(|c| c.name == NAMES[i]) {
                            repo.soft_delete(&token, &target.uuid()).await
                                .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        }
                    }
                }

                let active = repo.list_clusters(&token, false).await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                let mut per_name: HashMap<&str, usize> = HashMap::new();
                for c in &active {
                    *per_name.entry(c.name.as_str()).or_default() += 1;
                }
                prop_assert!(per_name.values().all(|&n| n <= 1), "{:?}", per_name);
            }
            Ok(())
        });
        outcome?;
    }
}
