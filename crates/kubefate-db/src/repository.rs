//! Cluster repository over a document store.
//!
//! Every operation takes a [`CancellationToken`]. The store call is raced
//! against the token; a cancelled call returns [`Error::Cancelled`] and drops
//! the store future.

use std::{future::Future, sync::Arc};

use kubefate_core::{
    document::keys, filter, from_document, to_document, validate_transition, Cluster,
    ClusterStatus, Error, Filter, Result, StoreError, StoreResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::Store;

/// Typed access to `Cluster` records held in a [`Store`]
pub struct ClusterRepository<S: Store + ?Sized = dyn Store> {
    store: Arc<S>,
}

impl<S: Store + ?Sized> Clone for ClusterRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store + ?Sized> std::fmt::Debug for ClusterRepository<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterRepository")
            .field("collection", &Cluster::COLLECTION)
            .finish_non_exhaustive()
    }
}

impl<S: Store + ?Sized> ClusterRepository<S> {
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Load a record by uuid, whatever its status.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if no record has this uuid
    /// - `Error::Corrupted` if more than one does
    /// - `Error::Storage` / `Error::Cancelled` from the store call
    pub async fn find_by_uuid(&self, token: &CancellationToken, uuid: &Uuid) -> Result<Cluster> {
        let docs = cancellable(
            token,
            self.store.find(Cluster::COLLECTION, &filter::by_uuid(uuid)),
        )
        .await?;

        match docs.as_slice() {
            [] => Err(Error::not_found("cluster", uuid)),
            [doc] => {
                let cluster = from_document(doc)?;
                debug!(uuid = %uuid, status = %cluster.status, "found cluster");
                Ok(cluster)
            }
            many => Err(Error::Corrupted(format!(
                "{} records share uuid {uuid}",
                many.len()
            ))),
        }
    }

    /// The `Running` record with this name in this namespace.
    ///
    /// Records in any other status are not returned, including ones
    /// [`exists_active`](Self::exists_active) reports.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if there is no running record
    pub async fn find_by_name_active(
        &self,
        token: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<Cluster> {
        let doc = cancellable(
            token,
            self.store.find_one(
                Cluster::COLLECTION,
                &filter::by_name_running(name, namespace),
            ),
        )
        .await?
        .ok_or_else(|| Error::not_found("cluster", format!("{namespace}/{name}")))?;

        let cluster = from_document(&doc)?;
        debug!(uuid = %cluster.uuid(), name, namespace, "found running cluster");
        Ok(cluster)
    }

    /// Every record matching `filter`, in no particular order
    ///
    /// # Errors
    ///
    /// Returns the first store or decoding failure
    pub async fn list(&self, token: &CancellationToken, filter: &Filter) -> Result<Vec<Cluster>> {
        let docs = cancellable(token, self.store.find(Cluster::COLLECTION, filter)).await?;
        let clusters = docs
            .iter()
            .map(from_document)
            .collect::<Result<Vec<_>>>()?;
        debug!(count = clusters.len(), "listed clusters");
        Ok(clusters)
    }

    /// All records when `all` is set, otherwise only those not deleted
    ///
    /// # Errors
    ///
    /// Same as [`list`](Self::list)
    pub async fn list_clusters(&self, token: &CancellationToken, all: bool) -> Result<Vec<Cluster>> {
        let filter = if all { Filter::all() } else { filter::active() };
        self.list(token, &filter).await
    }

    /// True if a record with this name and namespace exists and is not deleted
    ///
    /// # Errors
    ///
    /// Store failures are returned rather than read as "absent"
    pub async fn exists_active(
        &self,
        token: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<bool> {
        let found = cancellable(
            token,
            self.store.find_one(
                Cluster::COLLECTION,
                &filter::by_name_active(name, namespace),
            ),
        )
        .await?;
        Ok(found.is_some())
    }

    /// Persist a freshly constructed record.
    ///
    /// With an active-name unique index on the store, a second creator of
    /// the same `(name, namespace)` gets `Error::Storage(StoreError::Conflict)`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` unless the record is `Creating` at revision 0
    /// - `Error::Storage` / `Error::Cancelled` from the store call
    pub async fn create(&self, token: &CancellationToken, cluster: &Cluster) -> Result<()> {
        if cluster.status != ClusterStatus::Creating {
            return Err(Error::invalid_argument(format!(
                "new cluster must be {}, not {}",
                ClusterStatus::Creating,
                cluster.status
            )));
        }
        if cluster.revision != 0 {
            return Err(Error::invalid_argument(format!(
                "new cluster must have revision 0, not {}",
                cluster.revision
            )));
        }

        let result = cancellable(
            token,
            self.store
                .update_by_uuid(Cluster::COLLECTION, to_document(cluster)),
        )
        .await;
        if let Err(Error::Storage(ref e)) = result {
            if e.is_conflict() {
                warn!(name = %cluster.name, namespace = %cluster.namespace, "active cluster name taken");
            }
        }
        result?;

        debug!(uuid = %cluster.uuid(), name = %cluster.name, "created cluster");
        Ok(())
    }

    /// Write back a modified snapshot.
    ///
    /// The stored record must exist, must not be a tombstone, and must be at
    /// the snapshot's revision. On success the revision is bumped both in the
    /// store and in `cluster`.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the uuid is unknown
    /// - `Error::InvalidTransition` if the status change is not permitted
    /// - `Error::Storage(StoreError::Conflict)` if the snapshot is stale
    pub async fn update(&self, token: &CancellationToken, cluster: &mut Cluster) -> Result<()> {
        let stored = self.find_by_uuid(token, &cluster.uuid()).await?;
        check_status_change(stored.status, cluster.status)?;

        if stored.revision != cluster.revision {
            warn!(
                uuid = %cluster.uuid(),
                stored = stored.revision,
                given = cluster.revision,
                "stale cluster revision"
            );
            return Err(StoreError::conflict(format!(
                "cluster {} is at revision {}, update was based on {}",
                cluster.uuid(),
                stored.revision,
                cluster.revision
            ))
            .into());
        }

        let mut next = cluster.clone();
        self.write_revision(token, &mut next, stored.revision).await?;
        cluster.revision = next.revision;
        debug!(uuid = %cluster.uuid(), revision = cluster.revision, status = %cluster.status, "updated cluster");
        Ok(())
    }

    /// Mark a record `Deleted`. The record stays findable by uuid.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the uuid is unknown
    /// - `Error::InvalidTransition` unless the current status may move to
    ///   `Deleted`; deleting twice is rejected
    pub async fn soft_delete(&self, token: &CancellationToken, uuid: &Uuid) -> Result<()> {
        let mut cluster = self.find_by_uuid(token, uuid).await?;
        let expected = cluster.revision;
        cluster.transition_to(ClusterStatus::Deleted)?;
        self.write_revision(token, &mut cluster, expected).await?;
        debug!(uuid = %uuid, revision = cluster.revision, "soft deleted cluster");
        Ok(())
    }

    /// Store `cluster` at `expected + 1`, provided the stored record is still
    /// at `expected`
    async fn write_revision(
        &self,
        token: &CancellationToken,
        cluster: &mut Cluster,
        expected: u64,
    ) -> Result<()> {
        cluster.revision = expected
            .checked_add(1)
            .ok_or_else(|| Error::Corrupted(format!("revision overflow on {}", cluster.uuid())))?;

        let guard = Filter::eq(keys::REVISION, expected);
        let applied = cancellable(
            token,
            self.store
                .compare_and_update(Cluster::COLLECTION, to_document(cluster), &guard),
        )
        .await?;

        if applied {
            Ok(())
        } else {
            warn!(uuid = %cluster.uuid(), expected, "concurrent cluster modification");
            Err(StoreError::conflict(format!(
                "cluster {} changed since revision {expected}",
                cluster.uuid()
            ))
            .into())
        }
    }
}

/// A tombstone never changes; otherwise the status may stay or take a
/// permitted transition
fn check_status_change(from: ClusterStatus, to: ClusterStatus) -> Result<()> {
    if !from.is_active() {
        return Err(Error::InvalidTransition { from, to });
    }
    if from == to {
        return Ok(());
    }
    validate_transition(from, to)
}

async fn cancellable<T>(
    token: &CancellationToken,
    operation: impl Future<Output = StoreResult<T>>,
) -> Result<T> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::Cancelled),
        result = operation => result.map_err(Error::from),
    }
}
