//! Audit trail: who created/last modified an entity, and when.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// The zero timestamp (`DateTime::<Utc>::default()`, the Unix epoch).
///
/// A trail holding this value for either timestamp has not been stamped yet.
pub fn zero_time() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Creation/modification provenance carried by auditable entities.
///
/// Invariants enforced by the storage service:
/// - at creation, `created_by == last_modified_by` and
///   `creation_time == last_modification_time`
/// - `created_by` / `creation_time` never change after the first insert
/// - `last_modification_time` never moves backwards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub created_by: String,
    pub creation_time: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modification_time: DateTime<Utc>,
}

impl AuditTrail {
    /// A trail for a freshly created entity.
    pub fn created(user: impl Into<String>, at: DateTime<Utc>) -> Self {
        let user = user.into();
        Self {
            created_by: user.clone(),
            creation_time: at,
            last_modified_by: user,
            last_modification_time: at,
        }
    }

    /// Record a modification by `user` at `at`.
    pub fn touch(&mut self, user: impl Into<String>, at: DateTime<Utc>) {
        self.last_modified_by = user.into();
        self.last_modification_time = at;
    }

    /// Copy the immutable creation half from `stored`.
    pub fn reassert_creation(&mut self, stored: &AuditTrail) {
        self.created_by = stored.created_by.clone();
        self.creation_time = stored.creation_time;
    }
}

/// Entities that carry an [`AuditTrail`].
pub trait Auditable: Entity {
    fn audit_trail(&self) -> &AuditTrail;

    fn audit_trail_mut(&mut self) -> &mut AuditTrail;
}

/// Resolved accessors for an entity's audit trail (the "auditable view").
///
/// Entity types that implement [`Auditable`] return one of these from
/// [`Entity::audit_access`]:
///
/// ```ignore
/// fn audit_access() -> Option<AuditAccess<Self>> {
///     Some(AuditAccess::of())
/// }
/// ```
pub struct AuditAccess<E> {
    read: fn(&E) -> &AuditTrail,
    write: fn(&mut E) -> &mut AuditTrail,
}

impl<E> Clone for AuditAccess<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for AuditAccess<E> {}

impl<E> core::fmt::Debug for AuditAccess<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditAccess").finish_non_exhaustive()
    }
}

impl<E: Auditable> AuditAccess<E> {
    pub fn of() -> Self {
        Self {
            read: E::audit_trail,
            write: E::audit_trail_mut,
        }
    }
}

impl<E> AuditAccess<E> {
    pub fn trail<'a>(&self, entity: &'a E) -> &'a AuditTrail {
        (self.read)(entity)
    }

    pub fn trail_mut<'a>(&self, entity: &'a mut E) -> &'a mut AuditTrail {
        (self.write)(entity)
    }
}
