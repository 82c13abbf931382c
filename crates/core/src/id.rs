//! Primary key implementations for the key types used across the framework.

use uuid::Uuid;

use crate::entity::PrimaryKey;

macro_rules! impl_integer_key {
    ($($t:ty),*) => {
        $(
            impl PrimaryKey for $t {
                fn generate(sequence: u64) -> Option<Self> {
                    <$t>::try_from(sequence).ok()
                }

                fn sequence_value(&self) -> Option<u64> {
                    u64::try_from(*self).ok()
                }
            }
        )*
    };
}

impl_integer_key!(i32, i64, u32, u64);

impl PrimaryKey for Uuid {
    fn is_unset(&self) -> bool {
        self.is_nil()
    }

    /// Uses UUIDv7 (time-ordered); the sequence number is ignored.
    fn generate(_sequence: u64) -> Option<Self> {
        Some(Uuid::now_v7())
    }
}

/// Declare a UUID-backed newtype identifier usable as a [`PrimaryKey`].
///
/// ```ignore
/// keystone_core::uuid_key!(
///     /// Identifier of a category.
///     CategoryId
/// );
/// ```
#[macro_export]
macro_rules! uuid_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Create a new identifier.
            ///
            /// Prefer passing IDs explicitly in tests for determinism.
            pub fn new() -> Self {
                Self(::uuid::Uuid::now_v7())
            }

            pub fn from_uuid(uuid: ::uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &::uuid::Uuid {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                ::uuid::Uuid::from_str(s).map(Self)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(value: ::uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl $crate::PrimaryKey for $name {
            fn is_unset(&self) -> bool {
                self.0.is_nil()
            }

            fn generate(_sequence: u64) -> Option<Self> {
                Some(Self::new())
            }
        }
    };
}
