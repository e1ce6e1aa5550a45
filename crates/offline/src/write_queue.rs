//! Offline-first write queue, one persisted list per module kind.
//!
//! Writes made while disconnected are staged here until the sync
//! collaborator pushes them upstream. Every queue lives under its own key in
//! the [`KeyValueStore`](crate::store::KeyValueStore) as a JSON array, in
//! enqueue order.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use fieldguard_core::{Clock, GuardError, GuardResult, LocalRecordId, ModuleKind, UserId};
use serde_json::{Map, Value};

use crate::admission::OfflineAdmissionControl;
use crate::store::{SharedStore, StoreError, queue_key};
use crate::types::{PendingWriteRecord, SyncReport, SyncSummary};

/// Persisted per-module queues of pending writes.
///
/// Each public call is one atomic read-modify-write; calls are serialized on
/// an internal lock so concurrent callers never lose updates. Admission is
/// evaluated under the same lock, so a snapshot saved while holding
/// [`WriteQueueStore::exclusive`] is seen by every later enqueue.
pub struct WriteQueueStore {
    store: SharedStore,
    admission: OfflineAdmissionControl,
    clock: Arc<dyn Clock>,
    id_prefix: String,
    max_attempts: u32,
    lock: Mutex<()>,
}

impl WriteQueueStore {
    pub fn new(
        store: SharedStore,
        admission: OfflineAdmissionControl,
        clock: Arc<dyn Clock>,
        id_prefix: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            admission,
            clock,
            id_prefix: id_prefix.into(),
            max_attempts,
            lock: Mutex::new(()),
        }
    }

    pub fn admission(&self) -> &OfflineAdmissionControl {
        &self.admission
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Stage a write for `module`.
    ///
    /// Admission is checked under the queue lock; on denial nothing is written. The payload
    /// is stamped with `created_at`/`updated_at` (and `created_by` when an
    /// owner is given). Non-object payloads are wrapped as `{"value": ...}`.
    pub fn enqueue(
        &self,
        module: ModuleKind,
        payload: Value,
        owner: Option<&UserId>,
    ) -> GuardResult<LocalRecordId> {
        let _guard = self.guard();
        if !self.admission.can_admit(module) {
            tracing::warn!(module = %module, "offline write rejected: not authorized");
            return Err(GuardError::not_authorized_offline(module));
        }

        let now = self.clock.now();

        let mut records = self.read(module)?;
        let id = LocalRecordId::generate(&self.id_prefix);
        records.push(PendingWriteRecord {
            id: id.clone(),
            module,
            payload: stamp_payload(payload, now, owner),
            created_at: now,
            attempts: 0,
            last_error: None,
            owner_user_id: owner.cloned(),
        });
        self.write(module, &records)?;

        tracing::info!(module = %module, id = %id, "{} saved offline", module.display_name());
        Ok(id)
    }

    /// Pending records for `module`, in enqueue order.
    pub fn list(&self, module: ModuleKind) -> Vec<PendingWriteRecord> {
        let _guard = self.guard();
        self.read_or_empty(module)
    }

    pub fn count_pending(&self, module: ModuleKind) -> usize {
        self.list(module).len()
    }

    pub fn count_all_pending(&self) -> usize {
        ModuleKind::ALL.into_iter().map(|m| self.count_pending(m)).sum()
    }

    /// Module kinds that currently hold at least one pending record.
    pub fn modules_with_pending(&self) -> Vec<ModuleKind> {
        ModuleKind::ALL
            .into_iter()
            .filter(|m| self.count_pending(*m) > 0)
            .collect()
    }

    /// Remove the given ids from `module`'s queue. Returns how many were removed.
    pub fn remove_by_ids(&self, module: ModuleKind, ids: &[LocalRecordId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let _guard = self.guard();
        self.remove_locked(module, ids)
    }

    pub fn remove_all(&self, module: ModuleKind) {
        self.exclusive().remove_all(module);
    }

    /// Remove every module's queue.
    pub fn clear_all(&self) {
        self.exclusive().clear_all();
    }

    /// Hold the queue lock across several steps.
    ///
    /// No enqueue, sync batch or removal interleaves until the returned
    /// handle is dropped.
    pub fn exclusive(&self) -> ExclusiveQueues<'_> {
        ExclusiveQueues {
            queue: self,
            _guard: self.guard(),
        }
    }

    /// Count one failed sync attempt for `id`.
    ///
    /// `error` replaces the stored error when given; otherwise the previous one
    /// is kept. Returns the new attempt count.
    pub fn record_attempt_failure(
        &self,
        module: ModuleKind,
        id: &LocalRecordId,
        error: Option<&str>,
    ) -> GuardResult<u32> {
        let _guard = self.guard();
        self.record_failure_locked(module, id, error)
    }

    /// Records the sync collaborator should push for `module`.
    ///
    /// Admission is re-checked first: if the current snapshot no longer
    /// admits the module, its queue is purged and nothing is returned.
    pub fn take_sync_batch(&self, module: ModuleKind) -> Vec<PendingWriteRecord> {
        let _guard = self.guard();
        if !self.admission.can_admit(module) {
            let purged = self.read_or_empty(module).len();
            if purged > 0 {
                tracing::info!(module = %module, purged, "purging queue no longer admitted");
            }
            self.remove_all_locked(module);
            return Vec::new();
        }
        self.read_or_empty(module)
    }

    /// Apply what the sync collaborator observed for one batch.
    ///
    /// Synced ids are removed; failed ids get one more attempt. A failed id
    /// that had already used up `max_attempts` before this batch is retired.
    pub fn complete_sync(&self, module: ModuleKind, report: SyncReport) -> SyncSummary {
        let _guard = self.guard();

        let synced = self.remove_locked(module, &report.synced);

        let mut failed = 0;
        let mut retired = Vec::new();
        for (id, error) in &report.failed {
            match self.record_failure_locked(module, id, Some(error.as_str())) {
                Ok(attempts) if attempts > self.max_attempts => retired.push(id.clone()),
                Ok(_) => failed += 1,
                Err(err) => tracing::warn!(module = %module, id = %id, "sync failure not recorded: {err}"),
            }
        }

        if !retired.is_empty() {
            tracing::warn!(
                module = %module,
                retired = retired.len(),
                "retiring records that exhausted {} sync attempts",
                self.max_attempts
            );
            self.remove_locked(module, &retired);
        }

        SyncSummary {
            synced,
            failed,
            retired,
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove_locked(&self, module: ModuleKind, ids: &[LocalRecordId]) -> usize {
        let records = self.read_or_empty(module);
        let doomed: HashSet<&LocalRecordId> = ids.iter().collect();
        let before = records.len();
        let kept: Vec<PendingWriteRecord> = records
            .into_iter()
            .filter(|r| !doomed.contains(&r.id))
            .collect();
        let removed = before - kept.len();

        if removed > 0 {
            if let Err(err) = self.write(module, &kept) {
                tracing::warn!(module = %module, "failed to remove synced records: {err}");
                return 0;
            }
            tracing::debug!(module = %module, removed, "removed records from offline queue");
        }
        removed
    }

    fn remove_all_locked(&self, module: ModuleKind) {
        if let Err(err) = self.store.delete(&queue_key(module)) {
            tracing::warn!(module = %module, "failed to clear offline queue: {err}");
        }
    }

    fn record_failure_locked(
        &self,
        module: ModuleKind,
        id: &LocalRecordId,
        error: Option<&str>,
    ) -> GuardResult<u32> {
        let mut records = self.read(module)?;
        let record = records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| GuardError::RecordNotFound {
                module,
                id: id.clone(),
            })?;

        record.attempts = record.attempts.saturating_add(1);
        if let Some(error) = error {
            record.last_error = Some(error.to_string());
        }
        let attempts = record.attempts;

        self.write(module, &records)?;
        Ok(attempts)
    }

    /// Read `module`'s queue. A corrupted queue is discarded and read as empty.
    fn read(&self, module: ModuleKind) -> GuardResult<Vec<PendingWriteRecord>> {
        let key = queue_key(module);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<PendingWriteRecord>>(&raw) {
            Ok(records) => Ok(records),
            Err(err) => {
                let err = GuardError::QueueCorrupted {
                    module,
                    reason: err.to_string(),
                };
                tracing::warn!("{err}; discarding");
                if let Err(err) = self.store.delete(&key) {
                    tracing::warn!(module = %module, "failed to discard corrupted queue: {err}");
                }
                Ok(Vec::new())
            }
        }
    }

    fn read_or_empty(&self, module: ModuleKind) -> Vec<PendingWriteRecord> {
        self.read(module).unwrap_or_else(|err| {
            tracing::warn!(module = %module, "offline queue unreadable: {err}");
            Vec::new()
        })
    }

    fn write(&self, module: ModuleKind, records: &[PendingWriteRecord]) -> Result<(), StoreError> {
        let key = queue_key(module);
        if records.is_empty() {
            return self.store.delete(&key);
        }
        let raw = serde_json::to_string(records)
            .map_err(|e| StoreError::Backend(format!("failed to serialize queue: {e}")))?;
        self.store.set(&key, &raw)
    }
}

/// The queues with the lock held. See [`WriteQueueStore::exclusive`].
pub struct ExclusiveQueues<'a> {
    queue: &'a WriteQueueStore,
    _guard: MutexGuard<'a, ()>,
}

impl ExclusiveQueues<'_> {
    pub fn count_pending(&self, module: ModuleKind) -> usize {
        self.queue.read_or_empty(module).len()
    }

    pub fn count_all_pending(&self) -> usize {
        ModuleKind::ALL.into_iter().map(|m| self.count_pending(m)).sum()
    }

    pub fn remove_all(&self, module: ModuleKind) {
        self.queue.remove_all_locked(module);
    }

    pub fn clear_all(&self) {
        for module in ModuleKind::ALL {
            self.queue.remove_all_locked(module);
        }
    }
}

fn stamp_payload(payload: Value, now: DateTime<Utc>, owner: Option<&UserId>) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    let stamp = Value::String(now.to_rfc3339());
    map.insert("created_at".to_string(), stamp.clone());
    map.insert("updated_at".to_string(), stamp);
    if let Some(owner) = owner {
        map.insert("created_by".to_string(), Value::String(owner.to_string()));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use fieldguard_auth::{AccessPolicy, AuthorizationSnapshot, Role};
    use fieldguard_core::{DEFAULT_LOCAL_ID_PREFIX, ManualClock};
    use serde_json::json;

    use super::*;
    use crate::context_store::OfflineContextStore;
    use crate::store::{KeyValueStore, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        context: OfflineContextStore,
        queue: WriteQueueStore,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let context = OfflineContextStore::new(store.clone(), clock.clone(), Duration::hours(24));
        let admission =
            OfflineAdmissionControl::new(Arc::new(AccessPolicy::standard()), context.clone());
        let queue = WriteQueueStore::new(
            store.clone(),
            admission,
            clock.clone(),
            DEFAULT_LOCAL_ID_PREFIX,
            3,
        );
        Fixture {
            store,
            clock,
            context,
            queue,
        }
    }

    fn login(f: &Fixture, perms: &[&'static str]) -> UserId {
        let user = UserId::new("u-1");
        f.context.save(&AuthorizationSnapshot {
            user_id: Some(user.clone()),
            email: Some("field@x.com".into()),
            is_super_admin: false,
            role: Some(Role::new("Apontador")),
            permissions: perms.iter().copied().collect(),
            captured_at: f.clock.now(),
        });
        user
    }

    #[test]
    fn enqueue_stamps_and_preserves_order() {
        let f = fixture();
        let user = login(&f, &["cargas_create"]);

        let a = f
            .queue
            .enqueue(ModuleKind::CargoRegistration, json!({"placa": "ABC1D23"}), Some(&user))
            .unwrap();
        let b = f
            .queue
            .enqueue(ModuleKind::CargoRegistration, json!(42), None)
            .unwrap();

        let records = f.queue.list(ModuleKind::CargoRegistration);
        assert_eq!(records.iter().map(|r| r.id.clone()).collect::<Vec<_>>(), vec![a.clone(), b]);
        assert!(LocalRecordId::is_local(a.as_str(), DEFAULT_LOCAL_ID_PREFIX));

        let first = &records[0];
        assert_eq!(first.attempts, 0);
        assert_eq!(first.owner_user_id.as_ref(), Some(&user));
        assert_eq!(first.payload["placa"], "ABC1D23");
        assert_eq!(first.payload["created_by"], "u-1");
        assert_eq!(first.payload["created_at"], first.payload["updated_at"]);

        assert_eq!(records[1].payload["value"], 42);
        assert!(records[1].payload.get("created_by").is_none());
    }

    #[test]
    fn denied_enqueue_writes_nothing() {
        let f = fixture();
        login(&f, &["cargas_view"]);

        let err = f
            .queue
            .enqueue(ModuleKind::ServiceTicket, json!({}), None)
            .unwrap_err();
        assert!(matches!(err, GuardError::NotAuthorizedOffline { module: ModuleKind::ServiceTicket, .. }));
        assert!(f.queue.list(ModuleKind::ServiceTicket).is_empty());
    }

    /// Reads pass through; writes fail.
    struct ReadOnly(Arc<MemoryStore>);

    impl KeyValueStore for ReadOnly {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key)
        }

        fn set(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable)
        }

        fn delete(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable)
        }
    }

    #[test]
    fn enqueue_surfaces_failed_write() {
        let f = fixture();
        login(&f, &["cargas_create"]);

        let queue = WriteQueueStore::new(
            Arc::new(ReadOnly(f.store.clone())),
            f.queue.admission().clone(),
            f.clock.clone(),
            DEFAULT_LOCAL_ID_PREFIX,
            3,
        );
        let err = queue
            .enqueue(ModuleKind::CargoRegistration, json!({}), None)
            .unwrap_err();

        assert!(matches!(err, GuardError::PersistenceUnavailable(_)));
        assert!(err.is_rejection());
        assert!(f.queue.list(ModuleKind::CargoRegistration).is_empty());
    }

    #[test]
    fn unreadable_snapshot_rejects_enqueue() {
        let f = fixture();
        login(&f, &["cargas_create"]);
        f.store.set_available(false);

        let err = f
            .queue
            .enqueue(ModuleKind::CargoRegistration, json!({}), None)
            .unwrap_err();
        assert!(matches!(err, GuardError::NotAuthorizedOffline { .. }));

        f.store.set_available(true);
        assert_eq!(f.queue.count_all_pending(), 0);
    }

    #[test]
    fn attempts_only_increase() {
        let f = fixture();
        login(&f, &["os_create"]);
        let id = f.queue.enqueue(ModuleKind::ServiceTicket, json!({}), None).unwrap();

        assert_eq!(
            f.queue
                .record_attempt_failure(ModuleKind::ServiceTicket, &id, Some("timeout"))
                .unwrap(),
            1
        );
        assert_eq!(
            f.queue
                .record_attempt_failure(ModuleKind::ServiceTicket, &id, None)
                .unwrap(),
            2
        );

        let record = &f.queue.list(ModuleKind::ServiceTicket)[0];
        assert_eq!(record.attempts, 2);
        assert_eq!(record.last_error.as_deref(), Some("timeout"));

        let missing = LocalRecordId::from_raw("temp_missing");
        assert!(matches!(
            f.queue.record_attempt_failure(ModuleKind::ServiceTicket, &missing, None),
            Err(GuardError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn remove_by_ids_and_counts() {
        let f = fixture();
        login(&f, &["cargas_create", "os_create"]);
        let a = f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None).unwrap();
        let b = f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None).unwrap();
        f.queue.enqueue(ModuleKind::ServiceTicket, json!({}), None).unwrap();

        assert_eq!(f.queue.count_all_pending(), 3);
        assert_eq!(
            f.queue.modules_with_pending(),
            vec![ModuleKind::CargoRegistration, ModuleKind::ServiceTicket]
        );

        assert_eq!(f.queue.remove_by_ids(ModuleKind::CargoRegistration, &[a]), 1);
        assert_eq!(f.queue.list(ModuleKind::CargoRegistration)[0].id, b);

        f.queue.remove_all(ModuleKind::ServiceTicket);
        assert_eq!(f.queue.count_all_pending(), 1);

        f.queue.clear_all();
        assert_eq!(f.queue.count_all_pending(), 0);
    }

    #[test]
    fn corrupted_queue_is_discarded_alone() {
        let f = fixture();
        login(&f, &["cargas_create"]);
        f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None).unwrap();
        f.store
            .set(&queue_key(ModuleKind::WorkOrder), "[{\"broken\":")
            .unwrap();

        assert!(f.queue.list(ModuleKind::WorkOrder).is_empty());
        assert!(!f.store.contains_key(&queue_key(ModuleKind::WorkOrder)));
        assert_eq!(f.queue.count_pending(ModuleKind::CargoRegistration), 1);
    }

    #[test]
    fn complete_sync_removes_counts_and_retires() {
        let f = fixture();
        login(&f, &["cargas_create"]);
        let ok = f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None).unwrap();
        let flaky = f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None).unwrap();
        let worn = f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None).unwrap();
        let doomed = f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None).unwrap();

        for _ in 0..2 {
            f.queue
                .record_attempt_failure(ModuleKind::CargoRegistration, &worn, None)
                .unwrap();
        }
        for _ in 0..3 {
            f.queue
                .record_attempt_failure(ModuleKind::CargoRegistration, &doomed, None)
                .unwrap();
        }

        let batch = f.queue.take_sync_batch(ModuleKind::CargoRegistration);
        assert_eq!(batch.len(), 4);

        let summary = f.queue.complete_sync(
            ModuleKind::CargoRegistration,
            SyncReport::default()
                .synced(ok)
                .failed(flaky.clone(), "HTTP 500")
                .failed(worn.clone(), "HTTP 500")
                .failed(doomed.clone(), "HTTP 500"),
        );

        assert_eq!(summary.synced, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.retired, vec![doomed]);

        let left = f.queue.list(ModuleKind::CargoRegistration);
        assert_eq!(left.len(), 2);
        assert_eq!((left[0].id.clone(), left[0].attempts), (flaky, 1));
        assert_eq!((left[1].id.clone(), left[1].attempts), (worn, 3));
    }

    #[test]
    fn exclusive_hold_blocks_enqueue_until_released() {
        let f = Arc::new(fixture());
        login(&f, &["cargas_create"]);

        let held = f.queue.exclusive();
        let writer = {
            let f = f.clone();
            std::thread::spawn(move || f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None))
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        login(&f, &["cargas_view"]);
        assert_eq!(held.count_pending(ModuleKind::CargoRegistration), 0);
        drop(held);

        let err = writer.join().unwrap().unwrap_err();
        assert!(matches!(err, GuardError::NotAuthorizedOffline { .. }));
        assert_eq!(f.queue.count_pending(ModuleKind::CargoRegistration), 0);
    }

    #[test]
    fn sync_batch_purges_when_no_longer_admitted() {
        let f = fixture();
        login(&f, &["cargas_create"]);
        f.queue.enqueue(ModuleKind::CargoRegistration, json!({}), None).unwrap();

        login(&f, &["dashboard_view"]);
        assert!(f.queue.take_sync_batch(ModuleKind::CargoRegistration).is_empty());
        assert!(!f.store.contains_key(&queue_key(ModuleKind::CargoRegistration)));
    }
}
