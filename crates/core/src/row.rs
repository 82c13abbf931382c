//! Persisted-row capability: the storage-side representation of an entity.

use std::collections::HashSet;

use crate::entity::Entity;

/// A row type that a storage backend persists on behalf of entity `E`.
///
/// Rows are converted to and from domain entities; an update copies the
/// mutable fields of an incoming entity onto the stored row.
pub trait PersistedRow<E: Entity>: Clone + Send + Sync + 'static {
    /// Build a new row from a domain entity.
    fn from_entity(entity: &E) -> Self;

    /// Project the row back into its domain entity.
    fn to_entity(&self) -> E;

    /// Overwrite the row's fields from a domain entity.
    fn apply_entity(&mut self, entity: &E);

    /// Primary key of the row.
    fn key(&self) -> &E::Key;
}

/// Every entity can act as its own row.
impl<E: Entity> PersistedRow<E> for E {
    fn from_entity(entity: &E) -> Self {
        entity.clone()
    }

    fn to_entity(&self) -> E {
        self.clone()
    }

    fn apply_entity(&mut self, entity: &E) {
        *self = entity.clone();
    }

    fn key(&self) -> &E::Key {
        self.id()
    }
}

/// Reconcile a child collection of rows with its domain counterpart.
///
/// - rows whose key no longer appears in `domain` are removed
/// - domain entities without a matching row are appended as new rows
/// - matching rows receive [`PersistedRow::apply_entity`]
pub fn sync_child_rows<E, R>(domain: &[E], rows: &mut Vec<R>)
where
    E: Entity,
    R: PersistedRow<E>,
{
    let wanted: HashSet<&E::Key> = domain.iter().map(|e| e.id()).collect();
    rows.retain(|row| wanted.contains(row.key()));

    for entity in domain {
        match rows.iter_mut().find(|row| row.key() == entity.id()) {
            Some(row) => row.apply_entity(entity),
            None => rows.push(R::from_entity(entity)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Line {
        id: u32,
        qty: i64,
    }

    impl Entity for Line {
        type Key = u32;
        const ENTITY_NAME: &'static str = "Line";

        fn id(&self) -> &u32 {
            &self.id
        }

        fn set_id(&mut self, id: u32) {
            self.id = id;
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct LineRow {
        id: u32,
        qty: i64,
        touched: u32,
    }

    impl PersistedRow<Line> for LineRow {
        fn from_entity(entity: &Line) -> Self {
            Self {
                id: entity.id,
                qty: entity.qty,
                touched: 0,
            }
        }

        fn to_entity(&self) -> Line {
            Line {
                id: self.id,
                qty: self.qty,
            }
        }

        fn apply_entity(&mut self, entity: &Line) {
            self.qty = entity.qty;
            self.touched += 1;
        }

        fn key(&self) -> &u32 {
            &self.id
        }
    }

    #[test]
    fn entity_is_its_own_row() {
        let line = Line { id: 4, qty: 2 };
        let mut row = <Line as PersistedRow<Line>>::from_entity(&line);
        row.apply_entity(&Line { id: 4, qty: 9 });
        assert_eq!(row.to_entity().qty, 9);
        assert_eq!(*PersistedRow::<Line>::key(&row), 4);
    }

    #[test]
    fn sync_removes_adds_and_updates_rows() {
        let mut rows = vec![
            LineRow { id: 1, qty: 1, touched: 0 },
            LineRow { id: 2, qty: 2, touched: 0 },
        ];
        let domain = vec![Line { id: 2, qty: 20 }, Line { id: 3, qty: 30 }];

        sync_child_rows(&domain, &mut rows);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], LineRow { id: 2, qty: 20, touched: 1 });
        assert_eq!(rows[1], LineRow { id: 3, qty: 30, touched: 0 });
    }

    #[test]
    fn sync_with_empty_domain_clears_rows() {
        let mut rows = vec![LineRow { id: 1, qty: 1, touched: 0 }];
        sync_child_rows::<Line, LineRow>(&[], &mut rows);
        assert!(rows.is_empty());
    }
}
