//! Shared record and status types for the offline layer.

use chrono::{DateTime, Utc};
use fieldguard_core::{LocalRecordId, ModuleKind, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A write staged in a module's offline queue.
///
/// `attempts` only ever increases for a given `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWriteRecord {
    pub id: LocalRecordId,
    pub module: ModuleKind,
    /// Business record as provided by the caller, plus capture timestamps.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub owner_user_id: Option<UserId>,
}

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Online and connected to the data service.
    #[default]
    Online,
    /// Offline (network unreachable or data service unavailable).
    Offline,
}

/// What the sync collaborator observed for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: Vec<LocalRecordId>,
    pub failed: Vec<(LocalRecordId, String)>,
}

impl SyncReport {
    pub fn synced(mut self, id: LocalRecordId) -> Self {
        self.synced.push(id);
        self
    }

    pub fn failed(mut self, id: LocalRecordId, error: impl Into<String>) -> Self {
        self.failed.push((id, error.into()));
        self
    }
}

/// Result of applying a [`SyncReport`] to a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Records removed after a confirmed sync.
    pub synced: usize,
    /// Records that stayed queued with one more failed attempt.
    pub failed: usize,
    /// Records removed after reaching the attempt limit.
    pub retired: Vec<LocalRecordId>,
}
