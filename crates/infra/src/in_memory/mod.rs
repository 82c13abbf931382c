//! In-memory transactional backend.
//!
//! Intended for tests/dev. Not optimized for performance: every commit
//! clones the whole table set into a working copy, applies the staged changes
//! to it, and swaps it in only when all of them applied.

mod repository;
mod tables;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use keystone_core::{Entity, PersistedRow, PrimaryKey, RepositoryError, RepositoryResult};

use crate::unit_of_work::{RepositoryFactory, UnitOfWork, UnitOfWorkFactory};

pub use repository::InMemoryRepository;
use tables::{Table, Tables};

type StagedChange = Box<dyn FnOnce(&mut Tables) -> RepositoryResult<()> + Send>;

#[derive(Debug, thiserror::Error)]
#[error("lock poisoned")]
struct LockPoisoned;

fn poisoned<T>(operation: &'static str) -> impl FnOnce(T) -> RepositoryError {
    move |_| RepositoryError::backend(operation, LockPoisoned)
}

#[derive(Debug, Default)]
struct StoreInner {
    tables: RwLock<Tables>,
    sequences: Mutex<HashMap<TypeId, u64>>,
    commits: AtomicUsize,
}

/// Durable state shared by every unit of work begun from it.
///
/// Cloning the store clones the handle, not the data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new unit of work against this store.
    pub fn begin(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork {
            session: Arc::new(InMemorySession {
                store: self.clone(),
                pending: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Number of commit attempts that reached the store.
    pub fn commit_count(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Number of durable rows of type `R` for entity `E`.
    pub fn row_count<E, R>(&self) -> RepositoryResult<usize>
    where
        E: Entity,
        R: PersistedRow<E>,
    {
        let tables = self.inner.tables.read().map_err(poisoned("row_count"))?;
        Ok(tables
            .table::<E::Key, R>()?
            .map(Table::len)
            .unwrap_or_default())
    }

    fn next_sequence<K, R>(&self) -> RepositoryResult<u64>
    where
        K: PrimaryKey,
        R: 'static,
    {
        let mut sequences = self
            .inner
            .sequences
            .lock()
            .map_err(poisoned("next_sequence"))?;
        let next = sequences.entry(TypeId::of::<Table<K, R>>()).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    /// Advance the table's sequence past a caller-assigned key.
    fn observe_sequence<K, R>(&self, taken: u64) -> RepositoryResult<()>
    where
        K: PrimaryKey,
        R: 'static,
    {
        let mut sequences = self
            .inner
            .sequences
            .lock()
            .map_err(poisoned("observe_sequence"))?;
        let current = sequences.entry(TypeId::of::<Table<K, R>>()).or_insert(0);
        *current = (*current).max(taken);
        Ok(())
    }

    fn read<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Tables) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let tables = self.inner.tables.read().map_err(poisoned(operation))?;
        f(&tables)
    }

    fn apply(&self, changes: Vec<StagedChange>) -> RepositoryResult<usize> {
        self.inner.commits.fetch_add(1, Ordering::SeqCst);

        let mut tables = self.inner.tables.write().map_err(poisoned("commit"))?;
        let mut working = tables.clone();
        let applied = changes.len();
        for change in changes {
            change(&mut working)?;
        }
        *tables = working;
        Ok(applied)
    }
}

impl UnitOfWorkFactory for InMemoryStore {
    type UnitOfWork = InMemoryUnitOfWork;

    fn begin(&self) -> InMemoryUnitOfWork {
        InMemoryStore::begin(self)
    }
}

/// Session state shared between a unit of work and its repository views.
struct InMemorySession {
    store: InMemoryStore,
    pending: Mutex<Vec<StagedChange>>,
    disposed: AtomicBool,
}

impl InMemorySession {
    fn ensure_open(&self) -> RepositoryResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(RepositoryError::Disposed);
        }
        Ok(())
    }

    fn stage(&self, change: StagedChange) -> RepositoryResult<()> {
        self.ensure_open()?;
        self.pending.lock().map_err(poisoned("stage"))?.push(change);
        Ok(())
    }

    fn take_pending(&self, operation: &'static str) -> RepositoryResult<Vec<StagedChange>> {
        let mut pending = self.pending.lock().map_err(poisoned(operation))?;
        Ok(std::mem::take(&mut *pending))
    }
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    session: Arc<InMemorySession>,
}

impl core::fmt::Debug for InMemoryUnitOfWork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryUnitOfWork")
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl InMemoryUnitOfWork {
    /// Number of changes staged and not yet committed.
    pub fn pending_count(&self) -> usize {
        self.session
            .pending
            .lock()
            .map(|pending| pending.len())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(&self) -> RepositoryResult<usize> {
        self.session.ensure_open()?;
        let changes = self.session.take_pending("commit")?;
        self.session.store.apply(changes)
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        self.session.ensure_open()?;
        self.session.take_pending("rollback")?;
        Ok(())
    }

    fn dispose(&self) {
        if !self.session.disposed.swap(true, Ordering::SeqCst) {
            if let Ok(mut pending) = self.session.pending.lock() {
                pending.clear();
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.session.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<E, R> RepositoryFactory<E, R> for InMemoryUnitOfWork
where
    E: Entity,
    R: PersistedRow<E>,
{
    type Repository = InMemoryRepository<E, R>;

    fn repository(&self) -> InMemoryRepository<E, R> {
        InMemoryRepository::new(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;
    use keystone_core::DataRequest;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: u64,
        text: String,
    }

    impl Entity for Note {
        type Key = u64;
        const ENTITY_NAME: &'static str = "Note";

        fn id(&self) -> &u64 {
            &self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = id;
        }
    }

    fn note(text: &str) -> Note {
        Note {
            id: 0,
            text: text.to_string(),
        }
    }

    fn notes(uow: &InMemoryUnitOfWork) -> InMemoryRepository<Note, Note> {
        uow.repository()
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let repo = notes(&uow);

        let row = repo.insert(&note("a")).await.unwrap();
        assert_eq!(row.id, 1);
        assert!(repo.get_by_id(&1).await.unwrap().is_none());

        assert_eq!(uow.commit().await.unwrap(), 1);
        assert_eq!(repo.get_by_id(&1).await.unwrap(), Some(row));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn failed_commit_leaves_store_untouched() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let repo = notes(&uow);
        repo.insert(&Note { id: 7, text: "x".into() }).await.unwrap();
        uow.commit().await.unwrap();

        repo.insert(&note("fresh")).await.unwrap();
        repo.insert(&Note { id: 7, text: "dup".into() }).await.unwrap();
        let err = uow.commit().await.unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.row_count::<Note, Note>().unwrap(), 1);
        assert_eq!(uow.pending_count(), 0);
    }

    #[tokio::test]
    async fn units_of_work_share_durable_state() {
        let store = InMemoryStore::new();
        let first = store.begin();
        notes(&first).insert(&note("a")).await.unwrap();
        first.commit().await.unwrap();

        let second = store.begin();
        let all = notes(&second).list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "a");
    }

    #[tokio::test]
    async fn rollback_discards_staged_changes() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        notes(&uow).insert(&note("a")).await.unwrap();

        uow.rollback().await.unwrap();
        assert_eq!(uow.commit().await.unwrap(), 0);
        assert_eq!(store.row_count::<Note, Note>().unwrap(), 0);
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_closes_views() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let repo = notes(&uow);

        uow.dispose();
        uow.dispose();

        assert!(uow.is_disposed());
        assert!(matches!(repo.list_all().await, Err(RepositoryError::Disposed)));
        assert!(matches!(uow.commit().await, Err(RepositoryError::Disposed)));
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn dropping_the_unit_of_work_disposes_its_views() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let repo = notes(&uow);
        drop(uow);

        assert!(matches!(repo.get_by_id(&1).await, Err(RepositoryError::Disposed)));
    }

    #[tokio::test]
    async fn paging_uses_insertion_order() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let repo = notes(&uow);
        for text in ["a", "b", "c", "d"] {
            repo.insert(&note(text)).await.unwrap();
        }
        uow.commit().await.unwrap();

        let page = repo.list_paged(&DataRequest::page(1, 2)).await.unwrap();
        assert_eq!(page.total, 4);
        let texts: Vec<_> = page.items.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);

        let first = repo.find_first(&|n: &Note| n.text.as_str() > "a").await.unwrap();
        assert_eq!(first.map(|n| n.text), Some("b".to_string()));
    }

    #[tokio::test]
    async fn find_first_returns_the_earliest_match() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let repo = notes(&uow);
        for text in ["apple", "banana", "blueberry"] {
            repo.insert(&note(text)).await.unwrap();
        }
        uow.commit().await.unwrap();

        let wanted = String::from("b");
        let predicate = |n: &Note| n.text.starts_with(wanted.as_str());
        let found = repo.find_first(&predicate).await.unwrap();
        assert_eq!(found.map(|n| n.id), Some(2));
        assert!(repo.find_first(&|n: &Note| n.text.is_empty()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn generated_keys_skip_caller_assigned_ones() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let repo = notes(&uow);

        repo.insert(&Note { id: 1, text: "explicit".into() }).await.unwrap();
        let auto = repo.insert(&note("auto")).await.unwrap();
        repo.insert(&Note { id: 10, text: "far".into() }).await.unwrap();
        let after = repo.insert(&note("after")).await.unwrap();

        assert_eq!((auto.id, after.id), (2, 11));
        assert_eq!(uow.commit().await.unwrap(), 4);
        assert_eq!(store.row_count::<Note, Note>().unwrap(), 4);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tiny {
        id: u32,
    }

    impl Entity for Tiny {
        type Key = u32;
        const ENTITY_NAME: &'static str = "Tiny";

        fn id(&self) -> &u32 {
            &self.id
        }

        fn set_id(&mut self, id: u32) {
            self.id = id;
        }
    }

    #[tokio::test]
    async fn exhausted_key_range_is_a_mapping_error() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let repo: InMemoryRepository<Tiny, Tiny> = uow.repository();

        repo.insert(&Tiny { id: u32::MAX }).await.unwrap();
        let err = repo.insert(&Tiny { id: 0 }).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Mapping(_)), "{err:?}");
    }
}
