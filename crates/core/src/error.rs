//! Error model shared by storage backends and business services.

use std::error::Error as StdError;

use thiserror::Error;

use crate::validation::{FieldViolation, ValidationResult};

/// Result type returned by repositories and units of work.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type returned by business services.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Low-level storage failure produced by a backend.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The unit of work (and every repository view bound to it) was disposed.
    #[error("unit of work has been disposed")]
    Disposed,

    /// A write collided with the stored state (duplicate key, vanished row).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend does not support the requested operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A stored row could not be mapped to or from its entity.
    #[error("mapping failed: {0}")]
    Mapping(String),

    #[error("{operation} failed")]
    Backend {
        operation: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl RepositoryError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    pub fn backend(operation: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Discriminant of [`ServiceError`], for callers that branch on the kind only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    Storage,
    ArgumentNull,
    FieldCanNotBeUpdated,
    ModelValidation,
    ObjectNotFound,
    UnderlyingServiceCall,
}

/// Typed failure surfaced by a business service.
///
/// Callers never see a bare backend error: storage failures arrive wrapped in
/// [`ServiceError::Storage`] with the original error kept as the source.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Storage {
        message: String,
        #[source]
        source: RepositoryError,
    },

    /// An absent entity was passed where one is required.
    #[error("argument is null: {0}")]
    ArgumentNull(String),

    /// A modify tried to change a field that is fixed once the entity exists.
    #[error("field '{field}' of {model} can not be updated")]
    FieldCanNotBeUpdated { model: String, field: String },

    #[error("validation failed for {entity}: {} violation(s)", .violations.len())]
    ModelValidation {
        entity: String,
        violations: ValidationResult,
    },

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Failure reported by a downstream collaborator.
    #[error("{message}")]
    UnderlyingServiceCall {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ServiceError {
    pub fn storage(message: impl Into<String>, source: RepositoryError) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    pub fn argument_null(what: impl Into<String>) -> Self {
        Self::ArgumentNull(what.into())
    }

    pub fn field_can_not_be_updated(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldCanNotBeUpdated {
            model: model.into(),
            field: field.into(),
        }
    }

    pub fn model_validation(entity: impl Into<String>, violations: ValidationResult) -> Self {
        Self::ModelValidation {
            entity: entity.into(),
            violations,
        }
    }

    pub fn object_not_found(what: impl Into<String>) -> Self {
        Self::ObjectNotFound(what.into())
    }

    pub fn underlying_service_call(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::UnderlyingServiceCall {
            message: message.into(),
            source,
        }
    }

    /// Stable numeric code.
    pub fn code(&self) -> i32 {
        match self {
            ServiceError::Storage { .. } => 1,
            ServiceError::ArgumentNull(_) => 2,
            ServiceError::FieldCanNotBeUpdated { .. } => 3,
            ServiceError::ModelValidation { .. } => 4,
            ServiceError::ObjectNotFound(_) => 5,
            ServiceError::UnderlyingServiceCall { .. } => 6,
        }
    }

    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            ServiceError::Storage { .. } => ServiceErrorKind::Storage,
            ServiceError::ArgumentNull(_) => ServiceErrorKind::ArgumentNull,
            ServiceError::FieldCanNotBeUpdated { .. } => ServiceErrorKind::FieldCanNotBeUpdated,
            ServiceError::ModelValidation { .. } => ServiceErrorKind::ModelValidation,
            ServiceError::ObjectNotFound(_) => ServiceErrorKind::ObjectNotFound,
            ServiceError::UnderlyingServiceCall { .. } => ServiceErrorKind::UnderlyingServiceCall,
        }
    }

    /// Field violations for `ModelValidation`; empty for every other kind.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            ServiceError::ModelValidation { violations, .. } => violations.violations(),
            _ => &[],
        }
    }

    /// The display message followed by every nested source as `,level_<n>:<msg>`.
    pub fn diagnostic_chain(&self) -> String {
        let mut out = self.to_string();
        let mut level = 1;
        let mut current = self.source();
        while let Some(err) = current {
            out.push_str(&format!(",level_{level}:{err}"));
            level += 1;
            current = err.source();
        }
        out
    }
}
