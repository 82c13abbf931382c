use std::marker::PhantomData;
use std::sync::Arc;

use keystone_core::{
    DataRequest, DataResult, Entity, PersistedRow, PrimaryKey, RepositoryError, RepositoryResult,
};

use super::tables::Tables;
use super::InMemorySession;
use crate::repository::Repository;

/// Repository view over an in-memory unit of work.
pub struct InMemoryRepository<E, R> {
    session: Arc<InMemorySession>,
    _types: PhantomData<fn() -> (E, R)>,
}

impl<E, R> InMemoryRepository<E, R> {
    pub(super) fn new(session: Arc<InMemorySession>) -> Self {
        Self {
            session,
            _types: PhantomData,
        }
    }
}

impl<E, R> Clone for InMemoryRepository<E, R> {
    fn clone(&self) -> Self {
        Self::new(self.session.clone())
    }
}

impl<E, R> InMemoryRepository<E, R>
where
    E: Entity,
    R: PersistedRow<E>,
{
    fn rows(&self, operation: &'static str) -> RepositoryResult<Vec<R>> {
        self.session.ensure_open()?;
        self.session.store.read(operation, |tables| {
            Ok(tables
                .table::<E::Key, R>()?
                .map(|table| table.ordered().into_iter().cloned().collect())
                .unwrap_or_default())
        })
    }
}

#[async_trait::async_trait]
impl<E, R> Repository<E, R> for InMemoryRepository<E, R>
where
    E: Entity,
    R: PersistedRow<E>,
{
    async fn get_by_id(&self, id: &E::Key) -> RepositoryResult<Option<R>> {
        self.session.ensure_open()?;
        self.session.store.read("get_by_id", |tables| {
            Ok(tables
                .table::<E::Key, R>()?
                .and_then(|table| table.get(id).cloned()))
        })
    }

    async fn find_first(
        &self,
        predicate: &(dyn for<'p> Fn(&'p R) -> bool + Send + Sync),
    ) -> RepositoryResult<Option<R>> {
        Ok(self
            .rows("find_first")?
            .into_iter()
            .find(|row| predicate(row)))
    }

    async fn list_all(&self) -> RepositoryResult<Vec<R>> {
        self.rows("list_all")
    }

    async fn list_paged(&self, request: &DataRequest) -> RepositoryResult<DataResult<R>> {
        if !request.sort.is_empty() || request.filter.is_some() {
            return Err(RepositoryError::unsupported(
                "in-memory store pages in insertion order only; sort and filter are not evaluated",
            ));
        }

        let rows = self.rows("list_paged")?;
        let total = rows.len();
        let items = rows
            .into_iter()
            .skip(request.skip)
            .take(request.take.unwrap_or(usize::MAX))
            .collect();
        Ok(DataResult::new(items, total))
    }

    async fn insert(&self, entity: &E) -> RepositoryResult<R> {
        self.session.ensure_open()?;

        let mut entity = entity.clone();
        if entity.id().is_unset() {
            let sequence = self.session.store.next_sequence::<E::Key, R>()?;
            let key = E::Key::generate(sequence).ok_or_else(|| {
                RepositoryError::mapping(format!(
                    "key sequence value {sequence} does not fit the {} key type",
                    E::ENTITY_NAME
                ))
            })?;
            entity.set_id(key);
        } else if let Some(taken) = entity.id().sequence_value() {
            self.session.store.observe_sequence::<E::Key, R>(taken)?;
        }

        let row = R::from_entity(&entity);
        let staged = row.clone();
        self.session.stage(Box::new(move |tables: &mut Tables| {
            let key = staged.key().clone();
            tables.table_mut::<E::Key, R>()?.insert_new(key, staged)
        }))?;
        Ok(row)
    }

    async fn update(&self, row: &R) -> RepositoryResult<()> {
        let staged = row.clone();
        self.session.stage(Box::new(move |tables: &mut Tables| {
            let key = staged.key().clone();
            tables.table_mut::<E::Key, R>()?.replace(&key, staged)
        }))
    }

    async fn delete(&self, row: &R) -> RepositoryResult<()> {
        let key = row.key().clone();
        self.session.stage(Box::new(move |tables: &mut Tables| {
            tables.table_mut::<E::Key, R>()?.remove(&key)
        }))
    }
}
