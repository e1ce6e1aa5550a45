//! Error model shared by the permission and offline-queue layers.

use thiserror::Error;

use crate::{LocalRecordId, ModuleKind};

/// Result type used across the guard layer.
pub type GuardResult<T> = Result<T, GuardError>;

/// Guard-level error.
///
/// Ordinary denials are not errors: admission and route checks return plain
/// decisions. Only operations that would otherwise lose user data (staging a
/// write) or that callers must react to surface one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// The identity/profile collaborator could not be reached.
    #[error("identity source unavailable: {0}")]
    IdentityUnavailable(String),

    /// A queued write was rejected by offline admission control.
    #[error("not authorized to save {display_name} offline")]
    NotAuthorizedOffline {
        module: ModuleKind,
        display_name: &'static str,
    },

    /// The cached authorization snapshot is older than the freshness window.
    #[error("offline authorization snapshot expired")]
    StaleSnapshotExpired,

    /// The client-local store could not be read or written.
    #[error("local persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// A persisted queue failed to deserialize and was discarded.
    #[error("offline queue for {module} corrupted: {reason}")]
    QueueCorrupted { module: ModuleKind, reason: String },

    /// A module-kind tag that is not part of the fixed set.
    #[error("unknown module kind '{0}'")]
    UnknownModule(String),

    /// No pending record with the given id exists in the module queue.
    #[error("no pending {module} record with id {id}")]
    RecordNotFound { module: ModuleKind, id: LocalRecordId },
}

impl GuardError {
    pub fn identity_unavailable(msg: impl Into<String>) -> Self {
        Self::IdentityUnavailable(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceUnavailable(msg.into())
    }

    pub fn not_authorized_offline(module: ModuleKind) -> Self {
        Self::NotAuthorizedOffline {
            module,
            display_name: module.display_name(),
        }
    }

    /// Whether the caller must show this error inline (the write was not saved).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotAuthorizedOffline { .. } | Self::PersistenceUnavailable(_)
        )
    }
}
