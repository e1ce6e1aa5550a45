//! `fieldguard-core`: shared primitives for the permission and offline-queue layers.
//!
//! This crate contains **pure** building blocks (no storage, no identity lookups).

pub mod clock;
pub mod error;
pub mod id;
pub mod module;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GuardError, GuardResult};
pub use id::{LocalRecordId, UserId, DEFAULT_LOCAL_ID_PREFIX};
pub use module::ModuleKind;
