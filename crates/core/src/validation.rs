//! Field-level validation: violation codes, results, and the reusable audit passes.
//!
//! Validation never short-circuits: every applicable violation is collected so
//! callers receive the complete list in a single `ModelValidation` error.

use serde::{Deserialize, Serialize};

use crate::audit::{zero_time, AuditTrail, Auditable};
use crate::entity::Entity;

/// Closed set of validation failure reasons.
///
/// Numeric codes are stable so callers can branch on them across process
/// boundaries without string matching.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationCode {
    CreatedByIsEmpty,
    LastModifiedByIsEmpty,
    CreatedByAndLastModifiedByShouldBeSameAtStart,
    CreationTimeValueIsNotValid,
    CreationTimeAndLastModificationTimeShouldBeSameAtStart,
    LastModificationTimeValueIsNotValid,
    LastModificationTimeCanNotBeBeforeCreationOnModify,
    LastModificationTimeCanNotBeBeforeLastModificationOfDbObjectOnModify,
    ValueIsEmpty,
}

impl ViolationCode {
    pub fn as_i32(self) -> i32 {
        match self {
            ViolationCode::CreatedByIsEmpty => 1,
            ViolationCode::LastModifiedByIsEmpty => 2,
            ViolationCode::CreatedByAndLastModifiedByShouldBeSameAtStart => 3,
            ViolationCode::CreationTimeValueIsNotValid => 4,
            ViolationCode::CreationTimeAndLastModificationTimeShouldBeSameAtStart => 5,
            ViolationCode::LastModificationTimeValueIsNotValid => 6,
            ViolationCode::LastModificationTimeCanNotBeBeforeCreationOnModify => 7,
            ViolationCode::LastModificationTimeCanNotBeBeforeLastModificationOfDbObjectOnModify => 8,
            ViolationCode::ValueIsEmpty => 9,
        }
    }
}

/// A single field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field_name: String,
    pub code: ViolationCode,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field_name: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            code,
            message: message.into(),
        }
    }
}

/// Ordered list of violations; empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationResult {
    violations: Vec<FieldViolation>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: FieldViolation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, other: ValidationResult) {
        self.violations.extend(other.violations);
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_code(&self, code: ViolationCode) -> bool {
        self.violations.iter().any(|v| v.code == code)
    }

    pub fn has(&self, field_name: &str, code: ViolationCode) -> bool {
        self.violations
            .iter()
            .any(|v| v.code == code && v.field_name == field_name)
    }

    pub fn codes(&self) -> Vec<ViolationCode> {
        self.violations.iter().map(|v| v.code).collect()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn into_vec(self) -> Vec<FieldViolation> {
        self.violations
    }

    /// JSON array of `{ field_name, code, message }` objects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.violations
                .iter()
                .map(|v| {
                    serde_json::json!({
                        "field_name": v.field_name,
                        "code": v.code.as_i32(),
                        "message": v.message,
                    })
                })
                .collect(),
        )
    }
}

impl From<Vec<FieldViolation>> for ValidationResult {
    fn from(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn must_not_be_empty(field: &str) -> String {
    format!("the value of field '{field}' must not be empty")
}

/// Reusable `ValueIsEmpty` check for arbitrary string fields.
pub fn require_non_empty(field_name: &str, value: &str, result: &mut ValidationResult) {
    if is_blank(value) {
        result.push(FieldViolation::new(
            field_name,
            ViolationCode::ValueIsEmpty,
            must_not_be_empty(field_name),
        ));
    }
}

/// Creation-time audit checks.
///
/// Reports empty user names, unstamped timestamps, and any difference between
/// the creation and modification halves of the trail.
pub fn validate_audit_on_add(trail: &AuditTrail, result: &mut ValidationResult) {
    if is_blank(&trail.created_by) {
        result.push(FieldViolation::new(
            "created_by",
            ViolationCode::CreatedByIsEmpty,
            must_not_be_empty("created_by"),
        ));
    }
    if is_blank(&trail.last_modified_by) {
        result.push(FieldViolation::new(
            "last_modified_by",
            ViolationCode::LastModifiedByIsEmpty,
            must_not_be_empty("last_modified_by"),
        ));
    }
    if trail.last_modified_by != trail.created_by {
        result.push(FieldViolation::new(
            "last_modified_by",
            ViolationCode::CreatedByAndLastModifiedByShouldBeSameAtStart,
            "the value of field 'last_modified_by' must be the same as 'created_by' at creation",
        ));
    }
    if trail.creation_time == zero_time() {
        result.push(FieldViolation::new(
            "creation_time",
            ViolationCode::CreationTimeValueIsNotValid,
            "the value is invalid",
        ));
    }
    if trail.last_modification_time == zero_time() {
        result.push(FieldViolation::new(
            "last_modification_time",
            ViolationCode::LastModificationTimeValueIsNotValid,
            "the value is invalid",
        ));
    }
    if trail.creation_time != trail.last_modification_time {
        result.push(FieldViolation::new(
            "last_modification_time",
            ViolationCode::CreationTimeAndLastModificationTimeShouldBeSameAtStart,
            "the value of field 'creation_time' must be the same as 'last_modification_time' at creation",
        ));
    }
}

/// Modification-time audit checks against the stored trail.
///
/// This is a point-in-time comparison with the snapshot loaded by the caller;
/// it does not serialize concurrent modifications.
pub fn validate_audit_on_modify(incoming: &AuditTrail, stored: &AuditTrail, result: &mut ValidationResult) {
    if is_blank(&incoming.last_modified_by) {
        result.push(FieldViolation::new(
            "last_modified_by",
            ViolationCode::LastModifiedByIsEmpty,
            must_not_be_empty("last_modified_by"),
        ));
    }
    if incoming.last_modification_time == zero_time() {
        result.push(FieldViolation::new(
            "last_modification_time",
            ViolationCode::LastModificationTimeValueIsNotValid,
            "the value is invalid",
        ));
    }
    if incoming.last_modification_time < stored.creation_time {
        result.push(FieldViolation::new(
            "last_modification_time",
            ViolationCode::LastModificationTimeCanNotBeBeforeCreationOnModify,
            "'last_modification_time' of the incoming object must not be before 'creation_time' of the stored object",
        ));
    }
    if incoming.last_modification_time < stored.last_modification_time {
        result.push(FieldViolation::new(
            "last_modification_time",
            ViolationCode::LastModificationTimeCanNotBeBeforeLastModificationOfDbObjectOnModify,
            "'last_modification_time' of the incoming object must not be before 'last_modification_time' of the stored object",
        ));
    }
}

/// Per-service validation hook.
///
/// Both passes default to "valid". Concrete services compose the reusable
/// checks in this module with their own field rules.
pub trait EntityValidator<E: Entity>: Send + Sync {
    fn validate_on_add(&self, _item: &E) -> ValidationResult {
        ValidationResult::new()
    }

    fn validate_on_modify(&self, _incoming: &E, _stored: &E) -> ValidationResult {
        ValidationResult::new()
    }

    /// A field that `incoming` changes although it is fixed once stored.
    ///
    /// Checked on modify after `validate_on_modify` passes; a `Some` rejects
    /// the modification as `FieldCanNotBeUpdated`.
    fn locked_field(&self, _incoming: &E, _stored: &E) -> Option<&'static str> {
        None
    }
}

/// Accepts every entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidation;

impl<E: Entity> EntityValidator<E> for NoValidation {}

/// Runs only the audit passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditValidator;

impl<E: Auditable> EntityValidator<E> for AuditValidator {
    fn validate_on_add(&self, item: &E) -> ValidationResult {
        let mut result = ValidationResult::new();
        validate_audit_on_add(item.audit_trail(), &mut result);
        result
    }

    fn validate_on_modify(&self, incoming: &E, stored: &E) -> ValidationResult {
        let mut result = ValidationResult::new();
        validate_audit_on_modify(incoming.audit_trail(), stored.audit_trail(), &mut result);
        result
    }
}
