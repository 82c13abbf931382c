//! Shared fixtures for storage service tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use keystone_core::{
    AuditAccess, AuditTrail, Auditable, DataRequest, DataResult, Entity, PersistedRow,
    RepositoryError, RepositoryResult,
};
use keystone_infra::{
    InMemoryRepository, InMemoryStore, InMemoryUnitOfWork, Repository, RepositoryFactory,
    UnitOfWork,
};

pub const T0_SECS: i64 = 1_714_550_400;

pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(T0_SECS, 0).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Widget {
    pub id: i64,
    pub name: String,
    pub audit: AuditTrail,
}

impl Widget {
    pub fn new(name: &str, user: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            audit: AuditTrail::created(user, at),
        }
    }

    pub fn unstamped(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            audit: AuditTrail::default(),
        }
    }
}

impl Entity for Widget {
    type Key = i64;
    const ENTITY_NAME: &'static str = "Widget";

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn audit_access() -> Option<AuditAccess<Self>> {
        Some(AuditAccess::of())
    }
}

impl Auditable for Widget {
    fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    fn audit_trail_mut(&mut self) -> &mut AuditTrail {
        &mut self.audit
    }
}

keystone_core::uuid_key!(
    /// Identifier of a [`Tag`].
    TagId
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub label: String,
}

impl Entity for Tag {
    type Key = TagId;
    const ENTITY_NAME: &'static str = "Tag";

    fn id(&self) -> &TagId {
        &self.id
    }

    fn set_id(&mut self, id: TagId) {
        self.id = id;
    }
}

#[derive(Debug, thiserror::Error)]
#[error("injected {0} failure")]
pub struct Injected(pub &'static str);

/// Failure switches and counters shared by a scripted unit of work and its views.
#[derive(Debug, Default)]
pub struct Script {
    pub fail_commit: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_staging: AtomicBool,
    pub commits: AtomicUsize,
}

impl Script {
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, operation: &'static str) -> RepositoryResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepositoryError::backend(operation, Injected(operation)));
        }
        Ok(())
    }
}

/// In-memory unit of work with injectable failures and a commit counter.
pub struct ScriptedUnitOfWork {
    inner: InMemoryUnitOfWork,
    script: Arc<Script>,
}

impl ScriptedUnitOfWork {
    pub fn new(store: &InMemoryStore) -> (Self, Arc<Script>) {
        let script = Arc::new(Script::default());
        let uow = Self {
            inner: store.begin(),
            script: script.clone(),
        };
        (uow, script)
    }
}

#[async_trait::async_trait]
impl UnitOfWork for ScriptedUnitOfWork {
    async fn commit(&self) -> RepositoryResult<usize> {
        self.script.commits.fetch_add(1, Ordering::SeqCst);
        Script::check(&self.script.fail_commit, "commit")?;
        self.inner.commit().await
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        self.inner.rollback().await
    }

    fn dispose(&self) {
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl<E, R> RepositoryFactory<E, R> for ScriptedUnitOfWork
where
    E: Entity,
    R: PersistedRow<E>,
{
    type Repository = ScriptedRepository<E, R>;

    fn repository(&self) -> ScriptedRepository<E, R> {
        ScriptedRepository {
            inner: <InMemoryUnitOfWork as RepositoryFactory<E, R>>::repository(&self.inner),
            script: self.script.clone(),
        }
    }
}

pub struct ScriptedRepository<E, R> {
    inner: InMemoryRepository<E, R>,
    script: Arc<Script>,
}

#[async_trait::async_trait]
impl<E, R> Repository<E, R> for ScriptedRepository<E, R>
where
    E: Entity,
    R: PersistedRow<E>,
{
    async fn get_by_id(&self, id: &E::Key) -> RepositoryResult<Option<R>> {
        Script::check(&self.script.fail_reads, "get_by_id")?;
        self.inner.get_by_id(id).await
    }

    async fn find_first(
        &self,
        predicate: &(dyn for<'p> Fn(&'p R) -> bool + Send + Sync),
    ) -> RepositoryResult<Option<R>> {
        Script::check(&self.script.fail_reads, "find_first")?;
        self.inner.find_first(predicate).await
    }

    async fn list_all(&self) -> RepositoryResult<Vec<R>> {
        Script::check(&self.script.fail_reads, "list_all")?;
        self.inner.list_all().await
    }

    async fn list_paged(&self, request: &DataRequest) -> RepositoryResult<DataResult<R>> {
        Script::check(&self.script.fail_reads, "list_paged")?;
        self.inner.list_paged(request).await
    }

    async fn insert(&self, entity: &E) -> RepositoryResult<R> {
        Script::check(&self.script.fail_staging, "insert")?;
        self.inner.insert(entity).await
    }

    async fn update(&self, row: &R) -> RepositoryResult<()> {
        Script::check(&self.script.fail_staging, "update")?;
        self.inner.update(row).await
    }

    async fn delete(&self, row: &R) -> RepositoryResult<()> {
        Script::check(&self.script.fail_staging, "delete")?;
        self.inner.delete(row).await
    }
}
