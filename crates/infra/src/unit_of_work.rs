//! Unit-of-work contract: one storage session, one atomic commit.

use keystone_core::{Entity, PersistedRow, RepositoryResult};

use crate::repository::Repository;

/// Owns one storage session for the duration of a logical operation.
///
/// A unit of work is not meant to be shared between concurrently running
/// operations: acquire one per request (see [`UnitOfWorkFactory`]).
///
/// Disposal releases the session exactly once. Dropping a unit of work
/// disposes it, and repeated `dispose` calls are no-ops.
#[async_trait::async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Apply every staged change atomically and return how many were applied.
    ///
    /// Staged changes are discarded after the attempt whether or not it
    /// succeeded. On failure nothing is durably applied.
    async fn commit(&self) -> RepositoryResult<usize>;

    /// Discard staged changes without applying them.
    async fn rollback(&self) -> RepositoryResult<()>;

    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// Produces repository views bound to this unit of work's session.
///
/// Views for different entity types share the session, so a single commit
/// covers writes staged through any of them.
pub trait RepositoryFactory<E, R>: UnitOfWork
where
    E: Entity,
    R: PersistedRow<E>,
{
    type Repository: Repository<E, R>;

    fn repository(&self) -> Self::Repository;
}

/// Creates a fresh unit of work per logical operation.
pub trait UnitOfWorkFactory: Send + Sync {
    type UnitOfWork: UnitOfWork;

    fn begin(&self) -> Self::UnitOfWork;
}
