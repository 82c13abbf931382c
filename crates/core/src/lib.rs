//! `keystone-core`: entity model, validation, and error building blocks.
//!
//! This crate is **pure** (no IO): storage backends and business services live
//! in `keystone-infra`.

pub mod audit;
pub mod entity;
pub mod error;
pub mod id;
pub mod query;
pub mod row;
pub mod validation;

pub use audit::{zero_time, AuditAccess, AuditTrail, Auditable};
pub use entity::{Entity, PrimaryKey};
pub use error::{
    RepositoryError, RepositoryResult, ServiceError, ServiceErrorKind, ServiceResult,
};
pub use query::{DataRequest, DataResult, FilterNode, SortClause, SortDirection};
pub use row::{sync_child_rows, PersistedRow};
pub use validation::{
    require_non_empty, validate_audit_on_add, validate_audit_on_modify, AuditValidator,
    EntityValidator, FieldViolation, NoValidation, ValidationResult, ViolationCode,
};
