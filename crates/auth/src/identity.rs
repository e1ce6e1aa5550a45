//! Raw identity records handed over by the identity/profile collaborator.

use fieldguard_core::{GuardError, UserId};
use serde::{Deserialize, Serialize};

/// Identity record as received from the profile service.
///
/// Several optional shapes exist in the wild (email only, a role array, a
/// legacy single-role field). [`crate::resolver`] turns it into a snapshot
/// through an explicit ordered rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role_array: Option<Vec<String>>,
    #[serde(default)]
    pub legacy_role: Option<String>,
    /// Tokens granted through the identity's assigned permission role.
    #[serde(default)]
    pub granted_permissions: Vec<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl IdentityRecord {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_array = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_legacy_role(mut self, role: impl Into<String>) -> Self {
        self.legacy_role = Some(role.into());
        self
    }

    pub fn with_granted<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.granted_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Role array (empty when absent).
    pub fn roles(&self) -> &[String] {
        self.role_array.as_deref().unwrap_or(&[])
    }

    /// Legacy role, ignoring blank values.
    pub fn legacy_role(&self) -> Option<&str> {
        self.legacy_role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// Identity/profile collaborator.
///
/// `Ok(None)` means "no authenticated identity" (e.g. after logout);
/// `Err(GuardError::IdentityUnavailable)` means the source could not be reached.
pub trait IdentitySource {
    fn fetch(&self) -> Result<Option<IdentityRecord>, GuardError>;
}

impl<F> IdentitySource for F
where
    F: Fn() -> Result<Option<IdentityRecord>, GuardError>,
{
    fn fetch(&self) -> Result<Option<IdentityRecord>, GuardError> {
        self()
    }
}

/// Source that always returns the same record (or no identity).
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<IdentityRecord>);

impl IdentitySource for StaticIdentity {
    fn fetch(&self) -> Result<Option<IdentityRecord>, GuardError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_records() {
        let record: IdentityRecord =
            serde_json::from_str(r#"{"id":"u-1","email":"a@b.com"}"#).unwrap();
        assert_eq!(record.id.as_str(), "u-1");
        assert!(record.roles().is_empty());
        assert!(record.legacy_role().is_none());

        let record: IdentityRecord = serde_json::from_str(
            r#"{"id":"u-2","roleArray":["Encarregado"],"legacyRole":"  ","grantedPermissions":["os_view"]}"#,
        )
        .unwrap();
        assert_eq!(record.roles(), ["Encarregado".to_string()]);
        assert!(record.legacy_role().is_none());
        assert_eq!(record.granted_permissions, vec!["os_view"]);
    }
}
