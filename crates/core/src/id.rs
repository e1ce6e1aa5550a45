//! Strongly-typed identifiers used across the guard layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix carried by every locally generated record id.
///
/// Server-issued identifiers never start with it, so the sync collaborator can
/// tell a queued placeholder from a committed record.
pub const DEFAULT_LOCAL_ID_PREFIX: &str = "temp_";

/// External identity key (issued by the identity/profile collaborator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Identifier of a pending write staged in the offline queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalRecordId(String);

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_newtype!(UserId);
impl_string_newtype!(LocalRecordId);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl LocalRecordId {
    /// Generate a fresh local id (`<prefix><uuid v7>`).
    ///
    /// UUIDv7 keeps ids time-ordered, matching enqueue order.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}{}", Uuid::now_v7()))
    }

    /// Wrap an id read back from storage or handed in by the sync collaborator.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Whether `raw` looks like a locally generated placeholder.
    pub fn is_local(raw: &str, prefix: &str) -> bool {
        raw.strip_prefix(prefix)
            .is_some_and(|rest| Uuid::parse_str(rest).is_ok())
    }
}
