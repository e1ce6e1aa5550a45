//! Effective-authorization resolution.
//!
//! Precedence is an explicit ordered rule list: each rule either matches the
//! identity record and yields a [`Resolution`], or defers to the next one.
//! The first match wins; later rules are never consulted.

use chrono::{DateTime, Utc};

use crate::{
    AccessPolicy, AuthorizationSnapshot, IdentityRecord, IdentitySource, PermissionSet, Role,
    roles::SUPER_ADMIN_ROLE,
};

/// Which source elevated an identity to super admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperAdminSource {
    EmailAllowList,
    RoleArray,
    LegacyRole,
}

/// Outcome of the rule list, before permissions are materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    SuperAdmin(SuperAdminSource),
    LegacyRole(Role),
    RoleArray(Role),
    Baseline,
}

/// One precedence rule: a named predicate → result pair.
#[derive(Clone, Copy)]
pub struct ResolutionRule {
    pub name: &'static str,
    pub apply: fn(&IdentityRecord, &AccessPolicy) -> Option<Resolution>,
}

impl core::fmt::Debug for ResolutionRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResolutionRule").field("name", &self.name).finish()
    }
}

/// Resolution precedence, highest first.
pub const RESOLUTION_RULES: [ResolutionRule; 5] = [
    ResolutionRule { name: "super_admin_email", apply: super_admin_email },
    ResolutionRule { name: "super_admin_role_array", apply: super_admin_role_array },
    ResolutionRule { name: "legacy_role", apply: legacy_role },
    ResolutionRule { name: "first_role", apply: first_role },
    ResolutionRule { name: "baseline", apply: baseline },
];

fn super_admin_email(record: &IdentityRecord, policy: &AccessPolicy) -> Option<Resolution> {
    record
        .email
        .as_deref()
        .filter(|email| policy.is_super_admin_email(email))
        .map(|_| Resolution::SuperAdmin(SuperAdminSource::EmailAllowList))
}

fn super_admin_role_array(record: &IdentityRecord, _: &AccessPolicy) -> Option<Resolution> {
    record
        .roles()
        .iter()
        .any(|r| r == SUPER_ADMIN_ROLE)
        .then_some(Resolution::SuperAdmin(SuperAdminSource::RoleArray))
}

fn legacy_role(record: &IdentityRecord, _: &AccessPolicy) -> Option<Resolution> {
    record.legacy_role().map(|role| {
        if role == SUPER_ADMIN_ROLE {
            Resolution::SuperAdmin(SuperAdminSource::LegacyRole)
        } else {
            Resolution::LegacyRole(Role::new(role.to_string()))
        }
    })
}

fn first_role(record: &IdentityRecord, _: &AccessPolicy) -> Option<Resolution> {
    record
        .roles()
        .first()
        .map(|role| Resolution::RoleArray(Role::new(role.clone())))
}

fn baseline(_: &IdentityRecord, _: &AccessPolicy) -> Option<Resolution> {
    Some(Resolution::Baseline)
}

/// Run the rule list; returns the winning rule's name and its result.
pub fn classify(record: &IdentityRecord, policy: &AccessPolicy) -> (&'static str, Resolution) {
    RESOLUTION_RULES
        .iter()
        .find_map(|rule| (rule.apply)(record, policy).map(|res| (rule.name, res)))
        .unwrap_or(("baseline", Resolution::Baseline))
}

/// Computes [`AuthorizationSnapshot`]s from identity records.
///
/// - No IO beyond the [`IdentitySource`] it is handed
/// - No side effects (callers decide whether to persist)
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'a> {
    policy: &'a AccessPolicy,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(policy: &'a AccessPolicy) -> Self {
        Self { policy }
    }

    pub fn resolve(&self, record: &IdentityRecord, now: DateTime<Utc>) -> AuthorizationSnapshot {
        let (rule, resolution) = classify(record, self.policy);

        let (is_super_admin, role, permissions) = match resolution {
            Resolution::SuperAdmin(_) => (true, Role::super_admin(), self.policy.catalogue()),
            Resolution::LegacyRole(role) | Resolution::RoleArray(role) => {
                (false, role, self.elevated_baseline(record))
            }
            Resolution::Baseline => (false, Role::default_user(), self.elevated_baseline(record)),
        };

        tracing::debug!(
            user_id = %record.id,
            rule,
            role = %role,
            is_super_admin,
            permissions = permissions.len(),
            "resolved authorization"
        );

        AuthorizationSnapshot {
            user_id: Some(record.id.clone()),
            email: record.email.clone(),
            is_super_admin,
            role: Some(role),
            permissions,
            captured_at: now,
        }
    }

    /// Degraded snapshot used when the identity source cannot be reached.
    ///
    /// An already-authenticated session keeps its identity with baseline
    /// permissions; without a known identity the result is unauthenticated.
    pub fn resolve_unavailable(
        &self,
        previous: Option<&AuthorizationSnapshot>,
        now: DateTime<Utc>,
    ) -> AuthorizationSnapshot {
        match previous.filter(|p| p.is_authenticated()) {
            Some(prev) => AuthorizationSnapshot {
                user_id: prev.user_id.clone(),
                email: prev.email.clone(),
                is_super_admin: false,
                role: Some(Role::default_user()),
                permissions: self.policy.baseline().clone(),
                captured_at: now,
            },
            None => AuthorizationSnapshot::unauthenticated(now),
        }
    }

    /// Fetch from `source` and resolve, degrading per [`Self::resolve_unavailable`].
    pub fn resolve_from_source(
        &self,
        source: &dyn IdentitySource,
        previous: Option<&AuthorizationSnapshot>,
        now: DateTime<Utc>,
    ) -> AuthorizationSnapshot {
        match source.fetch() {
            Ok(Some(record)) => self.resolve(&record, now),
            Ok(None) => AuthorizationSnapshot::unauthenticated(now),
            Err(err) => {
                tracing::warn!("identity source failed, using degraded snapshot: {err}");
                self.resolve_unavailable(previous, now)
            }
        }
    }

    fn elevated_baseline(&self, record: &IdentityRecord) -> PermissionSet {
        let mut permissions = self.policy.baseline().clone();
        permissions.extend(
            record
                .granted_permissions
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );
        permissions
    }
}

#[cfg(test)]
mod tests {
    use fieldguard_core::{GuardError, UserId};
    use proptest::prelude::*;

    use super::*;
    use crate::StaticIdentity;

    fn policy() -> AccessPolicy {
        AccessPolicy::standard().with_super_admin_email("super@x.com")
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn email_allow_list_wins_over_conflicting_roles() {
        let policy = policy();
        let record = IdentityRecord::new("u-1")
            .with_email("SUPER@x.com")
            .with_roles(["Apontador"])
            .with_legacy_role("user");

        let snapshot = PermissionResolver::new(&policy).resolve(&record, now());

        assert!(snapshot.is_super_admin);
        assert_eq!(snapshot.role, Some(Role::super_admin()));
        assert_eq!(snapshot.permissions, policy.catalogue());
    }

    #[test]
    fn role_array_super_admin_before_legacy_field() {
        let policy = policy();
        let record = IdentityRecord::new("u-1")
            .with_roles(["Apontador", "SuperAdm"])
            .with_legacy_role("Encarregado");

        let (rule, resolution) = classify(&record, &policy);
        assert_eq!(rule, "super_admin_role_array");
        assert_eq!(resolution, Resolution::SuperAdmin(SuperAdminSource::RoleArray));
    }

    #[test]
    fn legacy_role_super_admin_gets_catalogue() {
        let policy = policy();
        let record = IdentityRecord::new("u-1").with_legacy_role("SuperAdm");

        let snapshot = PermissionResolver::new(&policy).resolve(&record, now());
        assert!(snapshot.is_super_admin);
        assert_eq!(snapshot.permissions, policy.catalogue());
    }

    #[test]
    fn legacy_role_beats_role_array_for_non_admins() {
        let policy = policy();
        let record = IdentityRecord::new("u-1")
            .with_roles(["Apontador"])
            .with_legacy_role("Encarregado");

        let snapshot = PermissionResolver::new(&policy).resolve(&record, now());
        assert!(!snapshot.is_super_admin);
        assert_eq!(snapshot.role, Some(Role::new("Encarregado")));
        assert_eq!(snapshot.permissions, *policy.baseline());
    }

    #[test]
    fn first_role_with_granted_permissions() {
        let policy = policy();
        let record = IdentityRecord::new("u-1")
            .with_roles(["Apontador", "Encarregado"])
            .with_granted(["cargas_view", "cargas_create", "cargas_view"]);

        let snapshot = PermissionResolver::new(&policy).resolve(&record, now());
        assert_eq!(snapshot.role, Some(Role::new("Apontador")));
        assert_eq!(
            snapshot.permissions.to_sorted_vec(),
            vec!["cargas_create", "cargas_view", "dashboard_view"]
        );
    }

    #[test]
    fn no_roles_falls_back_to_user_baseline() {
        let policy = policy();
        let record = IdentityRecord::new("u-1").with_email("someone@x.com");

        let snapshot = PermissionResolver::new(&policy).resolve(&record, now());
        assert_eq!(snapshot.role, Some(Role::default_user()));
        assert_eq!(snapshot.permissions.to_sorted_vec(), vec!["dashboard_view"]);
        assert_eq!(snapshot.user_id, Some(UserId::new("u-1")));
    }

    #[test]
    fn unavailable_source_keeps_known_identity_on_baseline() {
        let policy = policy();
        let resolver = PermissionResolver::new(&policy);
        let previous = resolver.resolve(
            &IdentityRecord::new("u-1").with_granted(["os_view"]),
            now(),
        );
        let source = || -> Result<Option<IdentityRecord>, GuardError> {
            Err(GuardError::identity_unavailable("timeout"))
        };

        let degraded = resolver.resolve_from_source(&source, Some(&previous), now());
        assert_eq!(degraded.user_id, previous.user_id);
        assert_eq!(degraded.permissions, *policy.baseline());

        let nobody = resolver.resolve_from_source(&source, None, now());
        assert!(!nobody.is_authenticated());
        assert!(nobody.permissions.is_empty());
    }

    #[test]
    fn logged_out_source_is_unauthenticated() {
        let policy = policy();
        let snapshot =
            PermissionResolver::new(&policy).resolve_from_source(&StaticIdentity(None), None, now());
        assert!(!snapshot.is_authenticated());
        assert!(snapshot.role.is_none());
    }

    proptest! {
        #[test]
        fn allow_listed_email_always_super_admin(
            roles in proptest::collection::vec("[A-Za-z]{0,12}", 0..4),
            legacy in proptest::option::of("[A-Za-z]{0,12}"),
        ) {
            let policy = policy();
            let mut record = IdentityRecord::new("u-1").with_email("super@x.com").with_roles(roles);
            record.legacy_role = legacy;

            let snapshot = PermissionResolver::new(&policy).resolve(&record, Utc::now());
            prop_assert!(snapshot.is_super_admin);
            prop_assert_eq!(snapshot.permissions, policy.catalogue());
        }

        #[test]
        fn super_admin_implies_canonical_role(
            roles in proptest::collection::vec("(SuperAdm|Apontador|user)", 0..4),
            legacy in proptest::option::of("(SuperAdm|Encarregado)"),
            granted in proptest::collection::vec("(os_view|cargas_view|os_view)", 0..6),
        ) {
            let policy = policy();
            let mut record = IdentityRecord::new("u-1").with_roles(roles).with_granted(granted);
            record.legacy_role = legacy;

            let snapshot = PermissionResolver::new(&policy).resolve(&record, Utc::now());
            if snapshot.is_super_admin {
                prop_assert_eq!(snapshot.role, Some(Role::super_admin()));
            }
            let tokens = snapshot.permissions.to_sorted_vec();
            let mut deduped = tokens.clone();
            deduped.dedup();
            prop_assert_eq!(tokens, deduped);
        }
    }
}
