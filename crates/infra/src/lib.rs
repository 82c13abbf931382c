//! `keystone-infra`: storage backends and the generic storage business service.
//!
//! - [`repository`] / [`unit_of_work`]: storage contracts used by services
//! - [`in_memory`]: transactional in-process backend (tests/dev)
//! - [`postgres`]: sqlx-backed backend
//! - [`service`]: validation, commit, error translation and log correlation

pub mod in_memory;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod unit_of_work;

pub use in_memory::{InMemoryRepository, InMemoryStore, InMemoryUnitOfWork};
pub use postgres::{PgRepository, PgStore, PgStoreConfig, PgTable, PgUnitOfWork, SqlValue};
pub use repository::Repository;
pub use service::{
    escape_braces, Operation, ServiceLog, StorageBusinessService, StorageService,
    StorageServiceConfig,
};
pub use unit_of_work::{RepositoryFactory, UnitOfWork, UnitOfWorkFactory};
