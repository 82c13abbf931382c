//! Row mapping between persisted rows and Postgres tables.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

use keystone_core::{Entity, PersistedRow};

/// A bind parameter. NULLs stay typed so Postgres can infer the column type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Bool(Option<bool>),
    Int(Option<i64>),
    Text(Option<String>),
    Uuid(Option<Uuid>),
    Timestamp(Option<DateTime<Utc>>),
    Json(Option<serde_json::Value>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Bool(v) => v.is_none(),
            SqlValue::Int(v) => v.is_none(),
            SqlValue::Text(v) => v.is_none(),
            SqlValue::Uuid(v) => v.is_none(),
            SqlValue::Timestamp(v) => v.is_none(),
            SqlValue::Json(v) => v.is_none(),
        }
    }

    pub(crate) fn bind_to<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Uuid(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(v),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(Some(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(Some(value))
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(Some(i64::from(value)))
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(Some(value))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(Some(value.to_string()))
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(Some(value))
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(Some(value))
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(value: serde_json::Value) -> Self {
        SqlValue::Json(Some(value))
    }
}

/// Maps a persisted row onto a Postgres table.
///
/// `values` must return one value per entry of `COLUMNS`, in the same order.
/// `from_row` reads the key column plus every entry of `COLUMNS`.
///
/// Integer keys left unset by the caller are drawn from `KEY_SEQUENCE` when
/// the row is staged, so the caller learns the key before commit. Key types
/// that generate their own values (UUIDv7) leave it as `None`.
pub trait PgTable<E: Entity>: PersistedRow<E> {
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    const COLUMNS: &'static [&'static str];
    const KEY_SEQUENCE: Option<&'static str> = None;

    fn key_value(key: &E::Key) -> SqlValue;

    fn values(&self) -> Vec<SqlValue>;

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;
}
