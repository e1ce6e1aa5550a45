use chrono::{DateTime, Duration, Utc};
use fieldguard_core::UserId;
use serde::{Deserialize, Serialize};

use crate::{PermissionSet, Role};

/// One complete, immutable resolution of a user's authorization.
///
/// # Invariants
/// - `permissions` holds no duplicates (enforced by [`PermissionSet`]).
/// - `is_super_admin` implies `role == Some(Role::super_admin())`.
///
/// Snapshots are superseded by the next resolution, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationSnapshot {
    pub user_id: Option<UserId>,
    pub email: Option<String>,
    pub is_super_admin: bool,
    pub role: Option<Role>,
    pub permissions: PermissionSet,
    pub captured_at: DateTime<Utc>,
}

impl AuthorizationSnapshot {
    /// Fully empty snapshot (no identity).
    pub fn unauthenticated(captured_at: DateTime<Utc>) -> Self {
        Self {
            user_id: None,
            email: None,
            is_super_admin: false,
            role: None,
            permissions: PermissionSet::new(),
            captured_at,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.captured_at)
    }

    /// Strictly older than `window` at `now`.
    pub fn is_older_than(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > window
    }

    /// Whether both snapshots belong to the same identity (including "none").
    pub fn same_identity(&self, other: &AuthorizationSnapshot) -> bool {
        self.user_id == other.user_id
    }

    /// Compare permission sets ignoring order.
    pub fn same_permissions(&self, other: &AuthorizationSnapshot) -> bool {
        self.permissions.to_sorted_vec() == other.permissions.to_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_strict() {
        let captured = Utc::now();
        let snapshot = AuthorizationSnapshot::unauthenticated(captured);
        let window = Duration::hours(24);

        assert!(!snapshot.is_older_than(window, captured + Duration::hours(24)));
        assert!(snapshot.is_older_than(window, captured + Duration::hours(25)));
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let snapshot = AuthorizationSnapshot {
            user_id: Some(UserId::new("u-1")),
            email: Some("a@b.com".into()),
            is_super_admin: false,
            role: Some(Role::new("Apontador")),
            permissions: ["os_view"].into_iter().collect(),
            captured_at: Utc::now(),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["userId"], "u-1");
        assert_eq!(json["isSuperAdmin"], false);
        assert_eq!(json["permissions"][0], "os_view");

        let back: AuthorizationSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
