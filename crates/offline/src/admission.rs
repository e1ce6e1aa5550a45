//! Offline admission: may this user stage writes for a module?

use std::sync::Arc;

use fieldguard_auth::{
    AccessExplanation, AccessPolicy, AuthState, AuthorizationSnapshot, explain_requirement,
};
use fieldguard_core::ModuleKind;
use serde::Serialize;

use crate::context_store::OfflineContextStore;

/// Outcome of an admission check, with the rule that settled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// No usable snapshot (absent, expired or unreadable).
    NoSnapshot,
    /// Snapshot carries no user.
    NoUser,
    SuperAdmin,
    SuperAdminEmail,
    /// Holds the module's required tokens.
    Granted,
    /// Lacks the module's required tokens.
    Missing,
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(
            self,
            Admission::SuperAdmin | Admission::SuperAdminEmail | Admission::Granted
        )
    }
}

/// Pure admission decision for `module` under `snapshot`.
///
/// The administrative-role allow-list plays no part here; it only widens
/// navigation.
pub fn decide(
    policy: &AccessPolicy,
    module: ModuleKind,
    snapshot: Option<&AuthorizationSnapshot>,
) -> Admission {
    let Some(snapshot) = snapshot else {
        return Admission::NoSnapshot;
    };
    if snapshot.user_id.is_none() {
        return Admission::NoUser;
    }
    if snapshot.is_super_admin {
        return Admission::SuperAdmin;
    }
    if snapshot
        .email
        .as_deref()
        .is_some_and(|email| policy.is_super_admin_email(email))
    {
        return Admission::SuperAdminEmail;
    }

    match policy.map().module(module) {
        Some(req) if req.is_satisfied_by(&snapshot.permissions) => Admission::Granted,
        Some(_) => Admission::Missing,
        // every module is mapped; an unmapped one stays closed
        None => Admission::Missing,
    }
}

/// Detailed explanation of [`decide`] for support tooling.
pub fn explain(
    policy: &AccessPolicy,
    module: ModuleKind,
    snapshot: &AuthorizationSnapshot,
) -> AccessExplanation {
    let email_override = snapshot.is_authenticated()
        && snapshot
            .email
            .as_deref()
            .is_some_and(|email| policy.is_super_admin_email(email));

    explain_requirement(
        module.tag(),
        policy.map().module(module),
        AuthState::Resolved(snapshot),
        email_override,
    )
}

/// Answers admission questions from the persisted offline snapshot.
///
/// Read-only: never mutates the store beyond the expiry cleanup that
/// [`OfflineContextStore::load`] performs.
#[derive(Clone)]
pub struct OfflineAdmissionControl {
    policy: Arc<AccessPolicy>,
    context: OfflineContextStore,
}

impl OfflineAdmissionControl {
    pub fn new(policy: Arc<AccessPolicy>, context: OfflineContextStore) -> Self {
        Self { policy, context }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn context(&self) -> &OfflineContextStore {
        &self.context
    }

    pub fn decide(&self, module: ModuleKind) -> Admission {
        let snapshot = self.context.load();
        let admission = decide(&self.policy, module, snapshot.as_ref());
        tracing::debug!(module = %module, ?admission, "offline admission");
        admission
    }

    pub fn can_admit(&self, module: ModuleKind) -> bool {
        self.decide(module).is_allowed()
    }
}
