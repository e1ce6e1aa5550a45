// ─────────────────────────────────────────────────────────────────────────────
// Offline readiness diagnostics (support/debugging)
// ─────────────────────────────────────────────────────────────────────────────

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fieldguard_auth::{
    AccessExplanation, AccessPolicy, AuthState, AuthorizationSnapshot, explain_requirement,
};
use fieldguard_core::{ModuleKind, UserId};
use serde::Serialize;

use crate::admission::{self, Admission};
use crate::context_store::OfflineContextStore;
use crate::types::ConnectivityState;
use crate::write_queue::WriteQueueStore;

/// State of the persisted offline snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotStatus {
    pub user_id: Option<UserId>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_super_admin: bool,
    pub permission_count: usize,
    pub captured_at: DateTime<Utc>,
    pub age_minutes: i64,
    /// Minutes left before the snapshot stops admitting offline writes.
    pub expires_in_minutes: i64,
}

/// Per-module offline readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStatus {
    pub module: ModuleKind,
    pub display_name: &'static str,
    pub admission: Admission,
    pub admitted: bool,
    pub pending: usize,
}

/// Serializable offline readiness report.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub generated_at: DateTime<Utc>,
    pub connectivity: ConnectivityState,
    /// `None` when no usable snapshot is stored.
    pub snapshot: Option<SnapshotStatus>,
    pub modules: Vec<ModuleStatus>,
    pub total_pending: usize,
}

impl DiagnosticReport {
    pub fn admitted_modules(&self) -> impl Iterator<Item = ModuleKind> + '_ {
        self.modules.iter().filter(|m| m.admitted).map(|m| m.module)
    }

    pub fn module(&self, module: ModuleKind) -> Option<&ModuleStatus> {
        self.modules.iter().find(|m| m.module == module)
    }
}

/// Answers "can this device work offline, and why (not)?" without mutating
/// anything beyond the expiry cleanup the snapshot store performs.
pub struct DiagnosticReporter {
    policy: Arc<AccessPolicy>,
    context: OfflineContextStore,
    queue: Arc<WriteQueueStore>,
    connectivity: ConnectivityState,
    current: Option<AuthorizationSnapshot>,
}

impl DiagnosticReporter {
    /// `current` is the in-memory snapshot used for navigation; `None` while
    /// resolution is still loading.
    pub fn new(
        policy: Arc<AccessPolicy>,
        context: OfflineContextStore,
        queue: Arc<WriteQueueStore>,
        connectivity: ConnectivityState,
        current: Option<AuthorizationSnapshot>,
    ) -> Self {
        Self {
            policy,
            context,
            queue,
            connectivity,
            current,
        }
    }

    pub fn report(&self) -> DiagnosticReport {
        let now = self.context.now();
        let stored = self.context.load();

        let snapshot = stored.as_ref().map(|s| SnapshotStatus {
            user_id: s.user_id.clone(),
            email: s.email.clone(),
            role: s.role.as_ref().map(|r| r.to_string()),
            is_super_admin: s.is_super_admin,
            permission_count: s.permissions.len(),
            captured_at: s.captured_at,
            age_minutes: s.age(now).num_minutes(),
            expires_in_minutes: (self.context.expires_at(s) - now).num_minutes(),
        });

        let modules: Vec<ModuleStatus> = ModuleKind::ALL
            .into_iter()
            .map(|module| {
                let admission = admission::decide(&self.policy, module, stored.as_ref());
                ModuleStatus {
                    module,
                    display_name: module.display_name(),
                    admission,
                    admitted: admission.is_allowed(),
                    pending: self.queue.count_pending(module),
                }
            })
            .collect();
        let total_pending = modules.iter().map(|m| m.pending).sum();

        tracing::debug!(
            connectivity = ?self.connectivity,
            has_snapshot = snapshot.is_some(),
            total_pending,
            "offline diagnostics"
        );

        DiagnosticReport {
            generated_at: now,
            connectivity: self.connectivity,
            snapshot,
            modules,
            total_pending,
        }
    }

    /// Why `route` is reachable (or not) for the current session.
    pub fn explain_route(&self, route: &str) -> AccessExplanation {
        let state = match &self.current {
            Some(s) => AuthState::Resolved(s),
            None => AuthState::Loading,
        };
        explain_requirement(route, self.policy.map().route(route), state, false)
    }

    /// Why offline writes for `module` are admitted (or not).
    pub fn explain_module(&self, module: ModuleKind) -> AccessExplanation {
        match self.context.load() {
            Some(snapshot) => admission::explain(&self.policy, module, &snapshot),
            None => {
                let empty = AuthorizationSnapshot::unauthenticated(self.context.now());
                let mut explanation = admission::explain(&self.policy, module, &empty);
                explanation.reason = "No usable offline snapshot (absent or expired)".to_string();
                explanation
            }
        }
    }
}
