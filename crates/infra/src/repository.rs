//! Repository contract.

use keystone_core::{DataRequest, DataResult, Entity, PersistedRow, RepositoryResult};

/// Per-entity view over a unit of work's session.
///
/// Reads observe durable state. Writes are **staged only**: nothing becomes
/// visible or durable until the owning unit of work commits.
///
/// ## Contract
///
/// - lookups never fail for "not found"; they return `Ok(None)`
/// - `insert` assigns a storage key when the entity's key is unset and returns
///   the staged row (carrying the key the commit will persist)
/// - every method fails with [`RepositoryError::Disposed`](keystone_core::RepositoryError::Disposed)
///   once the unit of work has been disposed
#[async_trait::async_trait]
pub trait Repository<E, R>: Send + Sync
where
    E: Entity,
    R: PersistedRow<E>,
{
    /// Point lookup by primary key.
    async fn get_by_id(&self, id: &E::Key) -> RepositoryResult<Option<R>>;

    /// First stored row (in storage order) matching `predicate`.
    async fn find_first(
        &self,
        predicate: &(dyn for<'p> Fn(&'p R) -> bool + Send + Sync),
    ) -> RepositoryResult<Option<R>>;

    /// Every stored row. Unbounded; prefer [`Repository::list_paged`].
    async fn list_all(&self) -> RepositoryResult<Vec<R>>;

    async fn list_paged(&self, request: &DataRequest) -> RepositoryResult<DataResult<R>>;

    /// Stage an insert.
    async fn insert(&self, entity: &E) -> RepositoryResult<R>;

    /// Stage a full-row replace for the row's key.
    async fn update(&self, row: &R) -> RepositoryResult<()>;

    /// Stage a removal.
    async fn delete(&self, row: &R) -> RepositoryResult<()>;
}
