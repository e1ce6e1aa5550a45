use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Canonical super-admin role label.
pub const SUPER_ADMIN_ROLE: &str = "SuperAdm";

/// Role assigned to authenticated identities with no recognizable role.
pub const DEFAULT_ROLE: &str = "user";

/// Administrative roles that pass the higher-level route guard regardless of
/// their permission tokens.
pub const DEFAULT_ADMIN_ROLES: [&str; 9] = [
    "AdmRH",
    "AdmEquipamentos",
    "AdmLogistica",
    "AdmRequisicoes",
    "Apontador",
    "Encarregado",
    "Engenheiro Civil",
    "Administrador",
    SUPER_ADMIN_ROLE,
];

/// Role label.
///
/// A snapshot carries a single canonical role; mapping roles to permissions
/// is the profile service's job, not this layer's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn super_admin() -> Self {
        Self(Cow::Borrowed(SUPER_ADMIN_ROLE))
    }

    pub const fn default_user() -> Self {
        Self(Cow::Borrowed(DEFAULT_ROLE))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_super_admin(&self) -> bool {
        self.as_str() == SUPER_ADMIN_ROLE
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
