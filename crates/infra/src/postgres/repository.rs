use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::Row;

use keystone_core::{
    DataRequest, DataResult, Entity, PrimaryKey, RepositoryError, RepositoryResult,
};

use super::sql;
use super::table::{PgTable, SqlValue};
use super::{map_sqlx_error, PgSession, PgStatement, StatementKind};
use crate::repository::Repository;

/// Repository view over a Postgres unit of work.
pub struct PgRepository<E, R> {
    session: Arc<PgSession>,
    _types: PhantomData<fn() -> (E, R)>,
}

impl<E, R> PgRepository<E, R> {
    pub(super) fn new(session: Arc<PgSession>) -> Self {
        Self {
            session,
            _types: PhantomData,
        }
    }
}

impl<E, R> Clone for PgRepository<E, R> {
    fn clone(&self) -> Self {
        Self::new(self.session.clone())
    }
}

impl<E, R> PgRepository<E, R>
where
    E: Entity,
    R: PgTable<E>,
{
    fn map_rows(rows: Vec<PgRow>) -> RepositoryResult<Vec<R>> {
        rows.iter()
            .map(|row| {
                R::from_row(row).map_err(|e| {
                    RepositoryError::mapping(format!("failed to read {} row: {e}", R::TABLE))
                })
            })
            .collect()
    }

    /// Fetch one page ordered by `order_by`; `limit = None` fetches the rest.
    async fn fetch_page(
        &self,
        operation: &'static str,
        order_by: &str,
        limit: Option<i64>,
        offset: i64,
    ) -> RepositoryResult<Vec<R>> {
        let statement = sql::select_page(R::TABLE, R::KEY_COLUMN, R::COLUMNS, order_by);
        let mut conn = self.session.connection().await?;
        let result = sqlx::query(&statement)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await;
        self.session.release(conn);
        Self::map_rows(result.map_err(|e| map_sqlx_error(operation, e))?)
    }

    async fn assign_key(&self, entity: &mut E) -> RepositoryResult<()> {
        if !entity.id().is_unset() {
            return Ok(());
        }

        let key = match R::KEY_SEQUENCE {
            Some(sequence) => {
                let mut conn = self.session.connection().await?;
                let result = sqlx::query(sql::next_key())
                    .bind(sequence)
                    .fetch_one(&mut *conn)
                    .await
                    .and_then(|row| row.try_get::<i64, _>(0));
                self.session.release(conn);
                let next = result.map_err(|e| map_sqlx_error("next_key", e))?;
                u64::try_from(next).ok().and_then(E::Key::generate)
            }
            None => E::Key::generate(0),
        };

        let key = key.filter(|key| !key.is_unset()).ok_or_else(|| {
            RepositoryError::mapping(format!(
                "{} key could not be generated: no key sequence, or a sequence value outside the key type",
                R::TABLE
            ))
        })?;
        entity.set_id(key);
        Ok(())
    }

    fn key_statement(kind: StatementKind, row: &R) -> PgStatement {
        let key = row.key();
        let (sql, values) = match kind {
            StatementKind::Insert => {
                let mut values = vec![R::key_value(key)];
                values.extend(row.values());
                (sql::insert(R::TABLE, R::KEY_COLUMN, R::COLUMNS), values)
            }
            StatementKind::Update => {
                let mut values = vec![R::key_value(key)];
                values.extend(row.values());
                (sql::update(R::TABLE, R::KEY_COLUMN, R::COLUMNS), values)
            }
            StatementKind::Delete => (sql::delete(R::TABLE, R::KEY_COLUMN), vec![R::key_value(key)]),
        };
        PgStatement {
            kind,
            sql,
            values,
            target: format!("{} {}", R::TABLE, key),
        }
    }
}

#[async_trait::async_trait]
impl<E, R> Repository<E, R> for PgRepository<E, R>
where
    E: Entity,
    R: PgTable<E>,
{
    async fn get_by_id(&self, id: &E::Key) -> RepositoryResult<Option<R>> {
        let statement = sql::select_by_key(R::TABLE, R::KEY_COLUMN, R::COLUMNS);
        let key: SqlValue = R::key_value(id);

        let mut conn = self.session.connection().await?;
        let result = key
            .bind_to(sqlx::query(&statement))
            .fetch_optional(&mut *conn)
            .await;
        self.session.release(conn);

        match result.map_err(|e| map_sqlx_error("get_by_id", e))? {
            Some(row) => Ok(Some(Self::map_rows(vec![row])?.remove(0))),
            None => Ok(None),
        }
    }

    async fn find_first(
        &self,
        predicate: &(dyn for<'p> Fn(&'p R) -> bool + Send + Sync),
    ) -> RepositoryResult<Option<R>> {
        let order_by = sql::order_by(&[], R::KEY_COLUMN, R::COLUMNS)?;
        let mut offset = 0;
        loop {
            let batch = self
                .fetch_page("find_first", &order_by, Some(sql::SCAN_BATCH), offset)
                .await?;
            let exhausted = (batch.len() as i64) < sql::SCAN_BATCH;
            if let Some(found) = batch.into_iter().find(|row| predicate(row)) {
                return Ok(Some(found));
            }
            if exhausted {
                return Ok(None);
            }
            offset += sql::SCAN_BATCH;
        }
    }

    async fn list_all(&self) -> RepositoryResult<Vec<R>> {
        let statement = sql::select_all(R::TABLE, R::KEY_COLUMN, R::COLUMNS);
        let mut conn = self.session.connection().await?;
        let result = sqlx::query(&statement).fetch_all(&mut *conn).await;
        self.session.release(conn);
        Self::map_rows(result.map_err(|e| map_sqlx_error("list_all", e))?)
    }

    async fn list_paged(&self, request: &DataRequest) -> RepositoryResult<DataResult<R>> {
        if request.filter.is_some() {
            return Err(RepositoryError::unsupported(
                "filter trees are not evaluated by the postgres backend",
            ));
        }
        let order_by = sql::order_by(&request.sort, R::KEY_COLUMN, R::COLUMNS)?;

        let mut conn = self.session.connection().await?;
        let counted = sqlx::query(&sql::count(R::TABLE))
            .fetch_one(&mut *conn)
            .await
            .and_then(|row| row.try_get::<i64, _>(0));
        self.session.release(conn);
        let total = counted.map_err(|e| map_sqlx_error("count", e))?;

        let limit = request.take.map(|n| n as i64);
        let items = self
            .fetch_page("list_paged", &order_by, limit, request.skip as i64)
            .await?;
        Ok(DataResult::new(items, total as usize))
    }

    async fn insert(&self, entity: &E) -> RepositoryResult<R> {
        self.session.ensure_open()?;
        let mut entity = entity.clone();
        self.assign_key(&mut entity).await?;

        let row = R::from_entity(&entity);
        self.session
            .stage(Self::key_statement(StatementKind::Insert, &row))?;
        Ok(row)
    }

    async fn update(&self, row: &R) -> RepositoryResult<()> {
        self.session
            .stage(Self::key_statement(StatementKind::Update, row))
    }

    async fn delete(&self, row: &R) -> RepositoryResult<()> {
        self.session
            .stage(Self::key_statement(StatementKind::Delete, row))
    }
}
