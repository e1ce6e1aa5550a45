//! Persisted offline authorization snapshot with a freshness window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fieldguard_auth::AuthorizationSnapshot;
use fieldguard_core::{Clock, GuardError, GuardResult};
use serde::{Deserialize, Serialize};

use crate::store::{CONTEXT_KEY, SharedStore};

const RECORD_VERSION: u32 = 1;

/// Persisted form of an [`AuthorizationSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineContextRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(flatten)]
    pub snapshot: AuthorizationSnapshot,
}

fn default_version() -> u32 {
    RECORD_VERSION
}

/// Stores the last resolved snapshot for offline admission decisions.
///
/// Never touches the network. Backend failures degrade: reads return
/// nothing, writes are skipped with a warning.
#[derive(Clone)]
pub struct OfflineContextStore {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    freshness: Duration,
}

impl OfflineContextStore {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, freshness: Duration) -> Self {
        Self {
            store,
            clock,
            freshness,
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// When `snapshot` stops being usable offline.
    pub fn expires_at(&self, snapshot: &AuthorizationSnapshot) -> DateTime<Utc> {
        snapshot.captured_at + self.freshness
    }

    /// Persist `snapshot`, overwriting any prior record.
    pub fn save(&self, snapshot: &AuthorizationSnapshot) {
        if let Err(err) = self.try_save(snapshot) {
            tracing::warn!("offline context not saved: {err}");
        }
    }

    pub fn try_save(&self, snapshot: &AuthorizationSnapshot) -> GuardResult<()> {
        let record = OfflineContextRecord {
            version: RECORD_VERSION,
            snapshot: snapshot.clone(),
        };
        let raw = serde_json::to_string(&record)
            .map_err(|e| GuardError::persistence(format!("failed to serialize offline context: {e}")))?;
        self.store.set(CONTEXT_KEY, &raw)?;

        tracing::debug!(user_id = ?snapshot.user_id, "offline context saved");
        Ok(())
    }

    /// Fresh snapshot, or `None` (absent, expired, unreadable).
    pub fn load(&self) -> Option<AuthorizationSnapshot> {
        match self.load_checked() {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::debug!("no usable offline context: {err}");
                None
            }
        }
    }

    /// Like [`Self::load`], but says why nothing usable was found.
    ///
    /// An expired or undecodable record is deleted as a side effect.
    pub fn load_checked(&self) -> GuardResult<AuthorizationSnapshot> {
        let snapshot = self
            .read_record()?
            .ok_or_else(|| GuardError::identity_unavailable("no offline authorization snapshot"))?;

        if snapshot.is_older_than(self.freshness, self.clock.now()) {
            tracing::info!(
                captured_at = %snapshot.captured_at,
                "offline context expired, removing"
            );
            self.clear();
            return Err(GuardError::StaleSnapshotExpired);
        }

        Ok(snapshot)
    }

    /// Last stored snapshot regardless of freshness.
    ///
    /// Only for identifying the previous owner during reconciliation; never
    /// use it for admission.
    pub fn last_known(&self) -> Option<AuthorizationSnapshot> {
        self.read_record().ok().flatten()
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.delete(CONTEXT_KEY) {
            tracing::warn!("failed to clear offline context: {err}");
        }
    }

    fn read_record(&self) -> GuardResult<Option<AuthorizationSnapshot>> {
        let raw = match self.store.get(CONTEXT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::warn!("offline context unreadable: {err}");
                return Err(err.into());
            }
        };

        match serde_json::from_str::<OfflineContextRecord>(&raw) {
            Ok(record) => Ok(Some(record.snapshot)),
            Err(err) => {
                tracing::warn!("discarding undecodable offline context: {err}");
                self.clear();
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fieldguard_auth::Role;
    use fieldguard_core::{ManualClock, UserId};

    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, OfflineContextStore) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ctx = OfflineContextStore::new(store.clone(), clock.clone(), Duration::hours(24));
        (store, clock, ctx)
    }

    fn snapshot(at: DateTime<Utc>) -> AuthorizationSnapshot {
        AuthorizationSnapshot {
            user_id: Some(UserId::new("u-1")),
            email: Some("field@x.com".into()),
            is_super_admin: false,
            role: Some(Role::new("Apontador")),
            permissions: ["cargas_view", "dashboard_view"].into_iter().collect(),
            captured_at: at,
        }
    }

    #[test]
    fn save_then_load() {
        let (_, clock, ctx) = setup();
        let s = snapshot(clock.now());

        ctx.save(&s);
        assert_eq!(ctx.load(), Some(s));
    }

    #[test]
    fn record_older_than_window_is_absent_and_removed() {
        let (store, clock, ctx) = setup();
        ctx.save(&snapshot(clock.now() - Duration::hours(25)));

        assert!(matches!(ctx.load_checked(), Err(GuardError::StaleSnapshotExpired)));
        assert!(!store.contains_key(CONTEXT_KEY));
        assert_eq!(ctx.load(), None);
    }

    #[test]
    fn record_within_window_survives_clock_advance() {
        let (_, clock, ctx) = setup();
        ctx.save(&snapshot(clock.now()));

        clock.advance(Duration::hours(23));
        assert!(ctx.load().is_some());

        clock.advance(Duration::hours(2));
        assert!(ctx.load().is_none());
    }

    #[test]
    fn last_known_ignores_freshness() {
        let (store, clock, ctx) = setup();
        ctx.save(&snapshot(clock.now() - Duration::hours(30)));

        assert!(ctx.last_known().is_some());
        assert!(store.contains_key(CONTEXT_KEY));
    }

    #[test]
    fn unavailable_backend_degrades() {
        let (store, clock, ctx) = setup();
        store.set_available(false);

        ctx.save(&snapshot(clock.now()));
        assert_eq!(ctx.load(), None);
        assert!(matches!(
            ctx.load_checked(),
            Err(GuardError::PersistenceUnavailable(_))
        ));

        store.set_available(true);
        assert!(store.is_empty());
    }

    #[test]
    fn undecodable_record_is_discarded() {
        let (store, _, ctx) = setup();
        store.set(CONTEXT_KEY, "{not json").unwrap();

        assert_eq!(ctx.load(), None);
        assert!(!store.contains_key(CONTEXT_KEY));
    }
}
