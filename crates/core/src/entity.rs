//! Entity trait: identity + optional audit capability.

use crate::audit::AuditAccess;

/// Capability required of an entity's primary key.
///
/// The key is a value type whose `Default` is the "unset" value. Storage
/// backends assign a key on insert when the caller left it unset; once a row
/// has been persisted its key never changes.
pub trait PrimaryKey:
    Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display + Default + Send + Sync + 'static
{
    /// Returns `true` when this key still holds the zero value.
    fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    /// Produce a storage-assigned key, or `None` when `sequence` does not fit
    /// the key type.
    ///
    /// `sequence` is the next value of the backing table's sequence. Integer
    /// keys use it directly; time-ordered keys (UUIDv7) ignore it.
    fn generate(sequence: u64) -> Option<Self>;

    /// Position this key occupies in a key sequence, if it was drawn from one.
    ///
    /// Backends use it to keep generated keys clear of caller-assigned ones.
    fn sequence_value(&self) -> Option<u64> {
        None
    }
}

/// Entity marker + minimal interface.
///
/// An entity is identified by its key. Entities that carry an audit trail
/// expose it through [`Entity::audit_access`], which the storage service
/// resolves once when it is constructed.
pub trait Entity: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Strongly-typed entity identifier.
    type Key: PrimaryKey;

    /// Human-readable entity name used in log lines and error messages.
    const ENTITY_NAME: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Key;

    /// Assign the identifier (used by storage backends on insert).
    fn set_id(&mut self, id: Self::Key);

    /// Accessors for the audit trail, if this entity type tracks one.
    fn audit_access() -> Option<AuditAccess<Self>> {
        None
    }
}
