//! `fieldguard-offline`
//!
//! **Responsibility:** offline-first persistence guarded by authorization.
//!
//! This crate provides:
//! - The persisted offline authorization snapshot (with a freshness window)
//! - Offline admission for field modules
//! - Per-module write queues for the sync collaborator
//! - Queue reconciliation on every identity change
//! - A session that serializes all of the above, plus diagnostics
//!
//! Storage goes through the [`KeyValueStore`] port; [`MemoryStore`] and
//! [`SqliteStore`] implement it.

pub mod admission;
pub mod config;
pub mod context_store;
pub mod diagnostics;
pub mod reconciler;
pub mod session;
pub mod sqlite;
pub mod store;
pub mod types;
pub mod write_queue;

pub use admission::{Admission, OfflineAdmissionControl};
pub use config::GuardConfig;
pub use context_store::{OfflineContextRecord, OfflineContextStore};
pub use diagnostics::{DiagnosticReport, DiagnosticReporter, ModuleStatus, SnapshotStatus};
pub use reconciler::{QueueReconciler, ReconcileOutcome};
pub use session::OfflineSession;
pub use sqlite::{SqliteStore, default_db_path};
pub use store::{CONTEXT_KEY, KeyValueStore, MemoryStore, SharedStore, StoreError, queue_key};
pub use types::{ConnectivityState, PendingWriteRecord, SyncReport, SyncSummary};
pub use write_queue::{ExclusiveQueues, WriteQueueStore};
