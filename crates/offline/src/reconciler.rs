//! Keeps persisted queues consistent with the latest authorization snapshot.

use std::sync::Arc;

use fieldguard_auth::{AccessPolicy, AuthorizationSnapshot};
use fieldguard_core::{ModuleKind, UserId};
use serde::Serialize;

use crate::admission::decide;
use crate::context_store::OfflineContextStore;
use crate::write_queue::{ExclusiveQueues, WriteQueueStore};

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Same user, same permissions: nothing purged.
    Unchanged,
    /// No previous snapshot or a different user: every queue was cleared.
    IdentityChanged {
        previous: Option<UserId>,
        current: Option<UserId>,
        cleared: usize,
    },
    /// Same user with different permissions.
    PermissionsChanged {
        /// Modules whose queue was purged, with the number of records dropped.
        purged: Vec<(ModuleKind, usize)>,
    },
}

impl ReconcileOutcome {
    /// Total records dropped.
    pub fn dropped(&self) -> usize {
        match self {
            ReconcileOutcome::Unchanged => 0,
            ReconcileOutcome::IdentityChanged { cleared, .. } => *cleared,
            ReconcileOutcome::PermissionsChanged { purged } => purged.iter().map(|(_, n)| n).sum(),
        }
    }
}

/// Runs `reconcile(old, new)` on every re-resolution.
pub struct QueueReconciler {
    policy: Arc<AccessPolicy>,
    context: OfflineContextStore,
    queue: Arc<WriteQueueStore>,
}

impl QueueReconciler {
    pub fn new(
        policy: Arc<AccessPolicy>,
        context: OfflineContextStore,
        queue: Arc<WriteQueueStore>,
    ) -> Self {
        Self {
            policy,
            context,
            queue,
        }
    }

    /// Purge what `new` no longer allows, then persist `new`.
    ///
    /// Both steps run with the queues held exclusively, so an enqueue either
    /// lands before the purge or is admitted against `new`.
    /// Idempotent: reconciling a snapshot against itself purges nothing.
    pub fn reconcile(
        &self,
        old: Option<&AuthorizationSnapshot>,
        new: &AuthorizationSnapshot,
    ) -> ReconcileOutcome {
        let queues = self.queue.exclusive();
        let outcome = match old {
            Some(old) if old.same_identity(new) => {
                if old.same_permissions(new) {
                    ReconcileOutcome::Unchanged
                } else {
                    self.purge_revoked(&queues, old, new)
                }
            }
            _ => self.clear_for_new_identity(&queues, old, new),
        };

        self.context.save(new);
        drop(queues);
        outcome
    }

    fn clear_for_new_identity(
        &self,
        queues: &ExclusiveQueues<'_>,
        old: Option<&AuthorizationSnapshot>,
        new: &AuthorizationSnapshot,
    ) -> ReconcileOutcome {
        let previous = old.and_then(|s| s.user_id.clone());
        let cleared = queues.count_all_pending();

        queues.clear_all();
        self.context.clear();

        tracing::info!(
            previous = ?previous,
            current = ?new.user_id,
            cleared,
            "identity changed, cleared offline queues"
        );

        ReconcileOutcome::IdentityChanged {
            previous,
            current: new.user_id.clone(),
            cleared,
        }
    }

    fn purge_revoked(
        &self,
        queues: &ExclusiveQueues<'_>,
        old: &AuthorizationSnapshot,
        new: &AuthorizationSnapshot,
    ) -> ReconcileOutcome {
        let mut purged = Vec::new();

        for module in ModuleKind::ALL {
            let was_admitted = decide(&self.policy, module, Some(old)).is_allowed();
            let is_admitted = decide(&self.policy, module, Some(new)).is_allowed();
            if !was_admitted || is_admitted {
                continue;
            }

            let count = queues.count_pending(module);
            queues.remove_all(module);
            tracing::info!(module = %module, count, "permission revoked, purged offline queue");
            purged.push((module, count));
        }

        ReconcileOutcome::PermissionsChanged { purged }
    }
}
