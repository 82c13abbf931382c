//! Type-erased table set backing the in-memory store.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use keystone_core::{PrimaryKey, RepositoryError, RepositoryResult};

/// Object-safe view of a `Table<K, R>` so tables of different row types can
/// live in one map and be cloned as a whole for a working copy.
trait AnyTable: Send + Sync {
    fn clone_box(&self) -> Box<dyn AnyTable>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Rows of one type keyed by primary key; `order` preserves insertion order.
#[derive(Debug, Clone)]
pub(crate) struct Table<K, R> {
    rows: HashMap<K, (u64, R)>,
    next_order: u64,
}

impl<K, R> Default for Table<K, R> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            next_order: 0,
        }
    }
}

impl<K, R> AnyTable for Table<K, R>
where
    K: PrimaryKey,
    R: Clone + Send + Sync + 'static,
{
    fn clone_box(&self) -> Box<dyn AnyTable> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<K, R> Table<K, R>
where
    K: PrimaryKey,
    R: Clone,
{
    pub(crate) fn get(&self, key: &K) -> Option<&R> {
        self.rows.get(key).map(|(_, row)| row)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows in insertion order.
    pub(crate) fn ordered(&self) -> Vec<&R> {
        let mut entries: Vec<&(u64, R)> = self.rows.values().collect();
        entries.sort_by_key(|(order, _)| *order);
        entries.into_iter().map(|(_, row)| row).collect()
    }

    pub(crate) fn insert_new(&mut self, key: K, row: R) -> RepositoryResult<()> {
        if self.rows.contains_key(&key) {
            return Err(RepositoryError::conflict(format!("duplicate key {key}")));
        }
        let order = self.next_order;
        self.next_order += 1;
        self.rows.insert(key, (order, row));
        Ok(())
    }

    pub(crate) fn replace(&mut self, key: &K, row: R) -> RepositoryResult<()> {
        match self.rows.get_mut(key) {
            Some((_, slot)) => {
                *slot = row;
                Ok(())
            }
            None => Err(RepositoryError::conflict(format!("row {key} no longer exists"))),
        }
    }

    pub(crate) fn remove(&mut self, key: &K) -> RepositoryResult<()> {
        self.rows
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::conflict(format!("row {key} no longer exists")))
    }
}

/// Every table of a store, keyed by `Table<K, R>` type.
#[derive(Default)]
pub(crate) struct Tables {
    tables: HashMap<TypeId, Box<dyn AnyTable>>,
}

impl Clone for Tables {
    fn clone(&self) -> Self {
        Self {
            tables: self
                .tables
                .iter()
                .map(|(id, table)| (*id, table.clone_box()))
                .collect(),
        }
    }
}

impl core::fmt::Debug for Tables {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tables")
            .field("count", &self.tables.len())
            .finish()
    }
}

impl Tables {
    pub(crate) fn table<K, R>(&self) -> RepositoryResult<Option<&Table<K, R>>>
    where
        K: PrimaryKey,
        R: Clone + Send + Sync + 'static,
    {
        match self.tables.get(&TypeId::of::<Table<K, R>>()) {
            Some(table) => table
                .as_any()
                .downcast_ref::<Table<K, R>>()
                .map(Some)
                .ok_or_else(|| RepositoryError::mapping(type_mismatch::<R>())),
            None => Ok(None),
        }
    }

    pub(crate) fn table_mut<K, R>(&mut self) -> RepositoryResult<&mut Table<K, R>>
    where
        K: PrimaryKey,
        R: Clone + Send + Sync + 'static,
    {
        self.tables
            .entry(TypeId::of::<Table<K, R>>())
            .or_insert_with(|| Box::new(Table::<K, R>::default()))
            .as_any_mut()
            .downcast_mut::<Table<K, R>>()
            .ok_or_else(|| RepositoryError::mapping(type_mismatch::<R>()))
    }
}

fn type_mismatch<R>() -> String {
    format!("table for {} holds a different row type", std::any::type_name::<R>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_survives_replace() {
        let mut table: Table<u32, &'static str> = Table::default();
        table.insert_new(3, "c").unwrap();
        table.insert_new(1, "a").unwrap();
        table.replace(&3, "C").unwrap();

        assert_eq!(table.ordered(), vec![&"C", &"a"]);
    }

    #[test]
    fn duplicate_and_missing_keys_conflict() {
        let mut table: Table<u32, u8> = Table::default();
        table.insert_new(1, 1).unwrap();

        assert!(matches!(table.insert_new(1, 2), Err(RepositoryError::Conflict(_))));
        assert!(matches!(table.replace(&2, 0), Err(RepositoryError::Conflict(_))));
        assert!(matches!(table.remove(&2), Err(RepositoryError::Conflict(_))));
    }

    #[test]
    fn cloned_tables_are_independent() {
        let mut tables = Tables::default();
        tables.table_mut::<u32, u8>().unwrap().insert_new(1, 1).unwrap();

        let mut working = tables.clone();
        working.table_mut::<u32, u8>().unwrap().remove(&1).unwrap();

        assert_eq!(tables.table::<u32, u8>().unwrap().unwrap().len(), 1);
        assert_eq!(working.table::<u32, u8>().unwrap().unwrap().len(), 0);
    }
}
