//! Generic storage business service.
//!
//! [`StorageService`] orchestrates one entity type over one unit of work:
//! validate, load, mutate, commit, log. Every failure reaches the caller as a
//! typed [`ServiceError`] after being logged exactly once.
//!
//! ## Operation flow
//!
//! | Operation | Steps | Log offset |
//! |-----------|-------|------------|
//! | `add` | argument check, on-add validation, stage insert, commit | +1 |
//! | `retrieve_by_id` | lookup | +2 |
//! | `modify` | argument check, load, on-modify validation, locked-field check, merge, stage update, commit | +3 |
//! | `remove_by_id` | lookup, stage delete, commit | +4 |
//! | `items` | paged listing | +5 |
//!
//! Not-found and validation failures are detected before anything is staged.

mod config;
mod log;

use std::marker::PhantomData;

use keystone_core::{
    AuditAccess, DataRequest, DataResult, Entity, EntityValidator, PersistedRow, ServiceError,
    ServiceResult,
};

use crate::repository::Repository;
use crate::unit_of_work::{RepositoryFactory, UnitOfWork};

pub use config::{StorageServiceConfig, DEFAULT_LOG_BASE_ID};
pub use log::{escape_braces, Operation, ServiceLog};

/// CRUD-style business operations over entity `E`.
#[async_trait::async_trait]
pub trait StorageBusinessService<E: Entity>: Send + Sync {
    fn log_base_id(&self) -> i64;

    /// Persist a new entity and return its key.
    async fn add(&self, item: Option<&E>) -> ServiceResult<E::Key>;

    async fn retrieve_by_id(&self, id: &E::Key) -> ServiceResult<E>;

    /// Replace the mutable fields of a stored entity.
    ///
    /// For auditable entities the stored `created_by` / `creation_time` are
    /// kept regardless of what `item` carries.
    async fn modify(&self, item: Option<&E>) -> ServiceResult<()>;

    async fn remove_by_id(&self, id: &E::Key) -> ServiceResult<()>;

    async fn items(&self, request: &DataRequest) -> ServiceResult<DataResult<E>>;
}

/// [`StorageBusinessService`] over any unit of work that can produce a
/// repository for `(E, R)`.
pub struct StorageService<E, R, U, V>
where
    E: Entity,
    R: PersistedRow<E>,
    U: RepositoryFactory<E, R>,
    V: EntityValidator<E>,
{
    unit_of_work: U,
    repository: U::Repository,
    validator: V,
    audit: Option<AuditAccess<E>>,
    log: ServiceLog,
    _row: PhantomData<fn() -> R>,
}

impl<E, R, U, V> StorageService<E, R, U, V>
where
    E: Entity,
    R: PersistedRow<E>,
    U: RepositoryFactory<E, R>,
    V: EntityValidator<E>,
{
    pub fn new(unit_of_work: U, validator: V, config: &StorageServiceConfig) -> Self {
        let repository = unit_of_work.repository();
        Self {
            unit_of_work,
            repository,
            validator,
            audit: E::audit_access(),
            log: ServiceLog::new(config.log_base_id, E::ENTITY_NAME),
            _row: PhantomData,
        }
    }

    pub fn unit_of_work(&self) -> &U {
        &self.unit_of_work
    }

    pub fn repository(&self) -> &U::Repository {
        &self.repository
    }

    pub fn is_auditable(&self) -> bool {
        self.audit.is_some()
    }

    fn not_found(id: &E::Key) -> ServiceError {
        ServiceError::object_not_found(format!("{} with id {} was not found", E::ENTITY_NAME, id))
    }

    async fn commit(&self, operation: Operation, object_id: &str, what: &str) -> ServiceResult<()> {
        match self.unit_of_work.commit().await {
            Ok(applied) => {
                self.log.success(
                    operation,
                    Some(object_id),
                    &format!("{what} {} {object_id}, {applied} change(s) committed", E::ENTITY_NAME),
                );
                Ok(())
            }
            Err(err) => Err(self.log.failed(
                operation,
                Some(object_id),
                ServiceError::storage(format!("Error in {} {}", operation.action(), E::ENTITY_NAME), err),
            )),
        }
    }

    /// Copy the merged entity onto the stored row, keeping the stored
    /// creation half of the audit trail.
    fn merge(&self, incoming: &E, stored_row: &mut R, stored: &E) {
        let mut merged = incoming.clone();
        if let Some(audit) = self.audit {
            audit
                .trail_mut(&mut merged)
                .reassert_creation(audit.trail(stored));
        }
        stored_row.apply_entity(&merged);
    }
}

#[async_trait::async_trait]
impl<E, R, U, V> StorageBusinessService<E> for StorageService<E, R, U, V>
where
    E: Entity,
    R: PersistedRow<E>,
    U: RepositoryFactory<E, R>,
    V: EntityValidator<E>,
{
    fn log_base_id(&self) -> i64 {
        self.log.log_base_id()
    }

    async fn add(&self, item: Option<&E>) -> ServiceResult<E::Key> {
        let op = Operation::Add;
        let Some(item) = item else {
            return Err(self.log.failed(op, None, ServiceError::argument_null("item")));
        };

        let violations = self.validator.validate_on_add(item);
        if !violations.is_valid() {
            return Err(self.log.failed(
                op,
                None,
                ServiceError::model_validation(E::ENTITY_NAME, violations),
            ));
        }

        let row = match self.repository.insert(item).await {
            Ok(row) => row,
            Err(err) => {
                return Err(self.log.failed(
                    op,
                    None,
                    ServiceError::storage(format!("Error in adding {}", E::ENTITY_NAME), err),
                ));
            }
        };

        let key = row.key().clone();
        self.commit(op, &key.to_string(), "Add").await?;
        Ok(key)
    }

    async fn retrieve_by_id(&self, id: &E::Key) -> ServiceResult<E> {
        let op = Operation::RetrieveSingle;
        let object_id = id.to_string();

        match self.repository.find_first(&|row: &R| row.key() == id).await {
            Ok(Some(row)) => {
                self.log.success(
                    op,
                    Some(&object_id),
                    &format!("Retrieve {} {object_id}", E::ENTITY_NAME),
                );
                Ok(row.to_entity())
            }
            Ok(None) => Err(self.log.failed(op, Some(&object_id), Self::not_found(id))),
            Err(err) => Err(self.log.failed(
                op,
                Some(&object_id),
                ServiceError::storage(format!("Error in retrieving {}", E::ENTITY_NAME), err),
            )),
        }
    }

    async fn modify(&self, item: Option<&E>) -> ServiceResult<()> {
        let op = Operation::Modify;
        let Some(item) = item else {
            return Err(self.log.failed(op, None, ServiceError::argument_null("item")));
        };
        let object_id = item.id().to_string();

        let mut stored_row = match self.repository.get_by_id(item.id()).await {
            Ok(Some(row)) => row,
            Ok(None) => return Err(self.log.failed(op, Some(&object_id), Self::not_found(item.id()))),
            Err(err) => {
                return Err(self.log.failed(
                    op,
                    Some(&object_id),
                    ServiceError::storage(format!("Error in loading {}", E::ENTITY_NAME), err),
                ));
            }
        };
        let stored = stored_row.to_entity();

        let violations = self.validator.validate_on_modify(item, &stored);
        if !violations.is_valid() {
            return Err(self.log.failed(
                op,
                Some(&object_id),
                ServiceError::model_validation(E::ENTITY_NAME, violations),
            ));
        }

        if let Some(field) = self.validator.locked_field(item, &stored) {
            return Err(self.log.failed(
                op,
                Some(&object_id),
                ServiceError::field_can_not_be_updated(E::ENTITY_NAME, field),
            ));
        }

        self.merge(item, &mut stored_row, &stored);
        if let Err(err) = self.repository.update(&stored_row).await {
            return Err(self.log.failed(
                op,
                Some(&object_id),
                ServiceError::storage(format!("Error in modifying {}", E::ENTITY_NAME), err),
            ));
        }

        self.commit(op, &object_id, "Modify").await
    }

    async fn remove_by_id(&self, id: &E::Key) -> ServiceResult<()> {
        let op = Operation::Remove;
        let object_id = id.to_string();

        let row = match self.repository.find_first(&|row: &R| row.key() == id).await {
            Ok(Some(row)) => row,
            Ok(None) => return Err(self.log.failed(op, Some(&object_id), Self::not_found(id))),
            Err(err) => {
                return Err(self.log.failed(
                    op,
                    Some(&object_id),
                    ServiceError::storage(format!("Error in loading {}", E::ENTITY_NAME), err),
                ));
            }
        };

        if let Err(err) = self.repository.delete(&row).await {
            return Err(self.log.failed(
                op,
                Some(&object_id),
                ServiceError::storage(format!("Error in removing {}", E::ENTITY_NAME), err),
            ));
        }

        self.commit(op, &object_id, "Remove").await
    }

    async fn items(&self, request: &DataRequest) -> ServiceResult<DataResult<E>> {
        let op = Operation::RetrieveMultiple;
        let parameters = request.render();

        match self.repository.list_paged(request).await {
            Ok(page) => {
                self.log.success(
                    op,
                    None,
                    &format!(
                        "Retrieve Multiple {}, with request parameters:: {parameters}, {} of {} item(s)",
                        E::ENTITY_NAME,
                        page.items.len(),
                        page.total
                    ),
                );
                Ok(page.map(|row| row.to_entity()))
            }
            Err(err) => Err(self.log.failed(
                op,
                None,
                ServiceError::storage(
                    format!(
                        "Error in Retrieve Multiple {}, with request parameters:: {parameters}",
                        E::ENTITY_NAME
                    ),
                    err,
                ),
            )),
        }
    }
}
