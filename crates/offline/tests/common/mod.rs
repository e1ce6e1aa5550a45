#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use fieldguard_auth::{IdentityRecord, StaticIdentity};
use fieldguard_core::ManualClock;
use fieldguard_offline::{GuardConfig, MemoryStore, OfflineSession};

pub const SUPER_EMAIL: &str = "super@x.com";

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub session: OfflineSession,
}

pub fn harness() -> Harness {
    fieldguard_observability::init_for_tests();

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let config = GuardConfig {
        super_admin_emails: vec![SUPER_EMAIL.to_string()],
        ..GuardConfig::default()
    };
    let session = OfflineSession::with_clock(store.clone(), config, clock.clone());

    Harness {
        store,
        clock,
        session,
    }
}

pub fn identity(id: &str, granted: &[&str]) -> StaticIdentity {
    StaticIdentity(Some(
        IdentityRecord::new(id)
            .with_email(format!("{id}@field.example"))
            .with_roles(["Apontador"])
            .with_granted(granted.iter().copied()),
    ))
}
