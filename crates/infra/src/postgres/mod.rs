//! Postgres-backed storage (sqlx).
//!
//! ## Session model
//!
//! A [`PgUnitOfWork`] lazily acquires one pooled connection and keeps it as
//! its session until disposed. Reads run on that connection immediately.
//! Writes are staged as SQL statements and replayed inside a single
//! transaction on commit; the first failing statement rolls the transaction
//! back and nothing is applied.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / Io / other | N/A | `Backend` |
//!
//! An `UPDATE` or `DELETE` that affects zero rows is a `Conflict`: the row
//! vanished between load and commit.

mod repository;
mod sql;
mod table;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool, Postgres};

use keystone_core::{Entity, RepositoryError, RepositoryResult};

use crate::unit_of_work::{RepositoryFactory, UnitOfWork, UnitOfWorkFactory};

pub use repository::PgRepository;
pub use table::{PgTable, SqlValue};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connection settings for [`PgStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgStoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl PgStoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Read `DATABASE_URL` (required) and `KEYSTONE_PG_MAX_CONNECTIONS`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let mut config = Self::new(database_url);

        if let Some(raw) = lookup("KEYSTONE_PG_MAX_CONNECTIONS") {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.max_connections = n,
                _ => tracing::warn!(
                    value = %raw,
                    default = DEFAULT_MAX_CONNECTIONS,
                    "invalid KEYSTONE_PG_MAX_CONNECTIONS, using default"
                ),
            }
        }

        Ok(config)
    }
}

/// Connection pool handle; begins one unit of work per logical operation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PgStoreConfig) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        tracing::info!(max_connections = config.max_connections, "postgres pool ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn begin(&self) -> PgUnitOfWork {
        PgUnitOfWork {
            session: Arc::new(PgSession {
                pool: self.pool.clone(),
                connection: Mutex::new(None),
                pending: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }
}

impl UnitOfWorkFactory for PgStore {
    type UnitOfWork = PgUnitOfWork;

    fn begin(&self) -> PgUnitOfWork {
        PgStore::begin(self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum StatementKind {
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    fn operation(self) -> &'static str {
        match self {
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
        }
    }
}

/// A staged write.
#[derive(Debug)]
struct PgStatement {
    kind: StatementKind,
    sql: String,
    values: Vec<SqlValue>,
    target: String,
}

impl PgStatement {
    async fn execute(self, conn: &mut PgConnection) -> RepositoryResult<usize> {
        let mut query = sqlx::query(&self.sql);
        for value in self.values {
            query = value.bind_to(query);
        }
        let done = query
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error(self.kind.operation(), e))?;

        if done.rows_affected() == 0 && self.kind != StatementKind::Insert {
            return Err(RepositoryError::conflict(format!(
                "{} of {} affected no rows",
                self.kind.operation(),
                self.target
            )));
        }
        Ok(done.rows_affected() as usize)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("lock poisoned")]
struct LockPoisoned;

fn poisoned<T>(operation: &'static str) -> impl FnOnce(T) -> RepositoryError {
    move |_| RepositoryError::backend(operation, LockPoisoned)
}

struct PgSession {
    pool: PgPool,
    connection: Mutex<Option<PoolConnection<Postgres>>>,
    pending: Mutex<Vec<PgStatement>>,
    disposed: AtomicBool,
}

impl PgSession {
    fn ensure_open(&self) -> RepositoryResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(RepositoryError::Disposed);
        }
        Ok(())
    }

    /// Check out the session connection, acquiring it on first use.
    async fn connection(&self) -> RepositoryResult<PoolConnection<Postgres>> {
        self.ensure_open()?;
        let cached = self
            .connection
            .lock()
            .map_err(poisoned("acquire"))?
            .take();
        match cached {
            Some(conn) => Ok(conn),
            None => self
                .pool
                .acquire()
                .await
                .map_err(|e| map_sqlx_error("acquire", e)),
        }
    }

    /// Return the connection to the session; after disposal it goes back to
    /// the pool instead.
    fn release(&self, conn: PoolConnection<Postgres>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if let Ok(mut slot) = self.connection.lock() {
            *slot = Some(conn);
        }
    }

    fn stage(&self, statement: PgStatement) -> RepositoryResult<()> {
        self.ensure_open()?;
        self.pending
            .lock()
            .map_err(poisoned("stage"))?
            .push(statement);
        Ok(())
    }

    fn take_pending(&self, operation: &'static str) -> RepositoryResult<Vec<PgStatement>> {
        let mut pending = self.pending.lock().map_err(poisoned(operation))?;
        Ok(std::mem::take(&mut *pending))
    }
}

async fn execute_in_transaction(
    conn: &mut PgConnection,
    statements: Vec<PgStatement>,
) -> RepositoryResult<usize> {
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| map_sqlx_error("begin_transaction", e))?;

    let mut affected = 0;
    for statement in statements {
        match statement.execute(&mut tx).await {
            Ok(n) => affected += n,
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback after failed statement did not complete");
                }
                return Err(err);
            }
        }
    }

    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))?;
    Ok(affected)
}

/// Unit of work over a [`PgStore`].
pub struct PgUnitOfWork {
    session: Arc<PgSession>,
}

impl core::fmt::Debug for PgUnitOfWork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PgUnitOfWork")
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(&self) -> RepositoryResult<usize> {
        self.session.ensure_open()?;
        let statements = self.session.take_pending("commit")?;
        if statements.is_empty() {
            return Ok(0);
        }

        let mut conn = self.session.connection().await?;
        let result = execute_in_transaction(&mut conn, statements).await;
        self.session.release(conn);
        result
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        self.session.ensure_open()?;
        self.session.take_pending("rollback")?;
        Ok(())
    }

    fn dispose(&self) {
        if self.session.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut pending) = self.session.pending.lock() {
            pending.clear();
        }
        if let Ok(mut slot) = self.session.connection.lock() {
            slot.take();
        }
    }

    fn is_disposed(&self) -> bool {
        self.session.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<E, R> RepositoryFactory<E, R> for PgUnitOfWork
where
    E: Entity,
    R: PgTable<E>,
{
    type Repository = PgRepository<E, R>;

    fn repository(&self) -> PgRepository<E, R> {
        PgRepository::new(self.session.clone())
    }
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return RepositoryError::conflict(format!(
                "unique violation in {operation}: {}",
                db_err.message()
            ));
        }
    }
    RepositoryError::backend(operation, err)
}
