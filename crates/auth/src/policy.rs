//! Access policy shared by resolution, admission and route guarding.

use std::collections::BTreeSet;

use crate::{PermissionMap, PermissionSet, Role, roles::DEFAULT_ADMIN_ROLES};

/// Static policy inputs: permission tables plus the two allow-lists.
///
/// Built once from configuration and passed explicitly; nothing here is
/// process-global.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    map: PermissionMap,
    super_admin_emails: BTreeSet<String>,
    admin_roles: Vec<Role>,
}

impl AccessPolicy {
    pub fn new<E, R>(map: PermissionMap, super_admin_emails: E, admin_roles: R) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        R: IntoIterator<Item = Role>,
    {
        Self {
            map,
            super_admin_emails: super_admin_emails
                .into_iter()
                .map(|e| normalize_email(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            admin_roles: admin_roles.into_iter().collect(),
        }
    }

    /// Standard tables, the default administrative roles and no super-admin emails.
    pub fn standard() -> Self {
        Self::new(
            PermissionMap::standard(),
            Vec::<String>::new(),
            DEFAULT_ADMIN_ROLES.into_iter().map(Role::new),
        )
    }

    pub fn with_super_admin_email(mut self, email: &str) -> Self {
        self.super_admin_emails.insert(normalize_email(email));
        self
    }

    pub fn map(&self) -> &PermissionMap {
        &self.map
    }

    pub fn baseline(&self) -> &PermissionSet {
        self.map.baseline()
    }

    pub fn catalogue(&self) -> PermissionSet {
        self.map.catalogue()
    }

    /// Case-insensitive allow-list lookup.
    pub fn is_super_admin_email(&self, email: &str) -> bool {
        self.super_admin_emails.contains(&normalize_email(email))
    }

    pub fn is_admin_role(&self, role: &Role) -> bool {
        self.admin_roles.iter().any(|r| r == role)
    }

    pub fn admin_roles(&self) -> &[Role] {
        &self.admin_roles
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
