//! Client-local key-value port.
//!
//! Everything the offline layer persists goes through [`KeyValueStore`]:
//! one authorization-snapshot key and one queue key per module kind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fieldguard_core::{GuardError, ModuleKind};
use thiserror::Error;

/// Key holding the serialized offline authorization snapshot.
pub const CONTEXT_KEY: &str = "user_offline_context";

/// Key holding the serialized pending-write list for `module`.
pub fn queue_key(module: ModuleKind) -> String {
    format!("offline_{}", module.tag())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable")]
    Unavailable,

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for GuardError {
    fn from(err: StoreError) -> Self {
        GuardError::persistence(err.to_string())
    }
}

/// Minimal key-value port (`get` / `set` / `delete`).
///
/// Implementations must make each call atomic on its own; callers that need
/// read-modify-write atomicity serialize around the port.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Shared handle to a store.
pub type SharedStore = Arc<dyn KeyValueStore>;

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}

/// In-memory store (tests and ephemeral sessions).
///
/// Can be switched off to simulate an inaccessible backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert_eq!(store.get("k"), Err(StoreError::Unavailable));
        assert_eq!(store.set("k", "v"), Err(StoreError::Unavailable));

        store.set_available(true);
        assert!(store.set("k", "v").is_ok());
    }

    #[test]
    fn queue_keys_follow_module_tags() {
        assert_eq!(queue_key(ModuleKind::CargoRegistration), "offline_registro_cargas");
        assert_eq!(queue_key(ModuleKind::WorkOrder), "offline_ordens_servico");
    }
}
