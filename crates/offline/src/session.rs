//! Offline session: one owner for snapshot, queues and connectivity.
//!
//! Identity changes, admissions and enqueues all pass through one lock, so a
//! re-resolution (with its purges) always completes before a later write is
//! admitted under the new snapshot.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use fieldguard_auth::{
    AccessPolicy, AuthState, AuthorizationSnapshot, GuardDecision, GuardOptions, IdentitySource,
    PermissionResolver, RouteGuard,
};
use fieldguard_core::{Clock, GuardResult, LocalRecordId, ModuleKind, SystemClock};
use serde_json::Value;

use crate::admission::OfflineAdmissionControl;
use crate::config::GuardConfig;
use crate::context_store::OfflineContextStore;
use crate::diagnostics::DiagnosticReporter;
use crate::reconciler::{QueueReconciler, ReconcileOutcome};
use crate::sqlite::{SqliteStore, default_db_path};
use crate::store::SharedStore;
use crate::types::ConnectivityState;
use crate::write_queue::WriteQueueStore;

#[derive(Debug, Default)]
struct SessionState {
    /// `None` until the first resolution (or offline restore) completes.
    current: Option<AuthorizationSnapshot>,
    connectivity: ConnectivityState,
    last_outcome: Option<ReconcileOutcome>,
}

pub struct OfflineSession {
    config: GuardConfig,
    policy: Arc<AccessPolicy>,
    clock: Arc<dyn Clock>,
    context: OfflineContextStore,
    queue: Arc<WriteQueueStore>,
    reconciler: QueueReconciler,
    state: Mutex<SessionState>,
}

impl OfflineSession {
    pub fn new(store: SharedStore, config: GuardConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: SharedStore, config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        let policy = Arc::new(config.access_policy());
        let context = OfflineContextStore::new(store.clone(), clock.clone(), config.freshness_window());
        let admission = OfflineAdmissionControl::new(policy.clone(), context.clone());
        let queue = Arc::new(WriteQueueStore::new(
            store,
            admission,
            clock.clone(),
            config.local_id_prefix.clone(),
            config.max_sync_attempts,
        ));
        let reconciler = QueueReconciler::new(policy.clone(), context.clone(), queue.clone());

        Self {
            config,
            policy,
            clock,
            context,
            queue,
            reconciler,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Session backed by SQLite at the configured path (or the platform default).
    pub fn open(config: GuardConfig) -> anyhow::Result<Self> {
        let path: PathBuf = match &config.sqlite_path {
            Some(path) => path.clone(),
            None => default_db_path()?,
        };
        let store = SqliteStore::open(&path)
            .with_context(|| format!("failed to open offline session store at {:?}", path))?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Queue handle for the sync collaborator.
    pub fn queue(&self) -> &Arc<WriteQueueStore> {
        &self.queue
    }

    /// Current in-memory snapshot (`None` while loading).
    pub fn current(&self) -> Option<AuthorizationSnapshot> {
        self.lock().current.clone()
    }

    /// What the last identity change did to the queues.
    pub fn last_outcome(&self) -> Option<ReconcileOutcome> {
        self.lock().last_outcome.clone()
    }

    /// Start from the persisted snapshot without contacting the identity
    /// source (cold start while offline). Nothing is purged.
    pub fn restore_offline(&self) -> Option<AuthorizationSnapshot> {
        let mut state = self.lock();
        let restored = self.context.load();
        match &restored {
            Some(s) => tracing::info!(user_id = ?s.user_id, "restored offline session"),
            None => tracing::info!("no usable offline snapshot to restore"),
        }
        state.current = restored.clone();
        restored
    }

    /// Resolve, reconcile and persist in one step.
    ///
    /// If the identity source is unreachable and a fresh stored snapshot for
    /// the same user exists, that snapshot is kept as is.
    pub fn on_identity_changed(&self, source: &dyn IdentitySource) -> AuthorizationSnapshot {
        let mut state = self.lock();
        let now = self.clock.now();
        let resolver = PermissionResolver::new(&self.policy);

        let previous = state.current.clone().or_else(|| self.context.last_known());

        let next = match source.fetch() {
            Ok(Some(record)) => resolver.resolve(&record, now),
            Ok(None) => AuthorizationSnapshot::unauthenticated(now),
            Err(err) => {
                tracing::warn!("identity source unavailable: {err}");
                let cached = self
                    .context
                    .load()
                    .filter(|cached| previous.as_ref().is_none_or(|p| p.same_identity(cached)))
                    .filter(AuthorizationSnapshot::is_authenticated);
                if let Some(cached) = cached {
                    tracing::info!(user_id = ?cached.user_id, "keeping cached offline snapshot");
                    state.current = Some(cached.clone());
                    return cached;
                }
                resolver.resolve_unavailable(previous.as_ref(), now)
            }
        };

        let outcome = self.reconciler.reconcile(previous.as_ref(), &next);
        tracing::debug!(?outcome, "identity change reconciled");

        state.current = Some(next.clone());
        state.last_outcome = Some(outcome);
        next
    }

    pub fn can_admit(&self, module: ModuleKind) -> bool {
        let _state = self.lock();
        self.queue.admission().can_admit(module)
    }

    /// Stage a write owned by the current user.
    pub fn enqueue(&self, module: ModuleKind, payload: Value) -> GuardResult<LocalRecordId> {
        let state = self.lock();
        let owner = state.current.as_ref().and_then(|s| s.user_id.as_ref());
        self.queue.enqueue(module, payload, owner)
    }

    pub fn count_all_pending(&self) -> usize {
        self.queue.count_all_pending()
    }

    pub fn can_access_route(&self, route: &str) -> bool {
        let state = self.lock();
        self.route_guard(&state).can_access_route(route)
    }

    pub fn accessible_routes(&self) -> Vec<String> {
        let state = self.lock();
        self.route_guard(&state)
            .accessible_routes()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn guard(&self, options: &GuardOptions) -> GuardDecision {
        let state = self.lock();
        self.route_guard(&state).guard(options)
    }

    pub fn guard_route(&self, route: &str) -> GuardDecision {
        let state = self.lock();
        self.route_guard(&state).guard_route(route)
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.lock().connectivity
    }

    pub fn set_connectivity(&self, connectivity: ConnectivityState) {
        let mut state = self.lock();
        if state.connectivity != connectivity {
            tracing::info!(?connectivity, "connectivity changed");
        }
        state.connectivity = connectivity;
    }

    pub fn is_offline(&self) -> bool {
        self.connectivity() == ConnectivityState::Offline
    }

    pub fn diagnostics(&self) -> DiagnosticReporter {
        let state = self.lock();
        DiagnosticReporter::new(
            self.policy.clone(),
            self.context.clone(),
            self.queue.clone(),
            state.connectivity,
            state.current.clone(),
        )
    }

    fn route_guard<'a>(&'a self, state: &'a SessionState) -> RouteGuard<'a> {
        let auth = match &state.current {
            Some(snapshot) => AuthState::Resolved(snapshot),
            None => AuthState::Loading,
        };
        RouteGuard::new(&self.policy, auth)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
