//! `fieldguard-auth`: authorization resolution and route guarding.
//!
//! This crate is intentionally decoupled from storage and transport: it turns
//! identity records into [`AuthorizationSnapshot`]s and answers access
//! questions about them. Persisting snapshots is the offline layer's job.

pub mod explain;
pub mod identity;
pub mod permission_map;
pub mod permissions;
pub mod policy;
pub mod resolver;
pub mod roles;
pub mod route_guard;
pub mod snapshot;

pub use explain::{AccessExplanation, DecisionBasis, explain_requirement};
pub use identity::{IdentityRecord, IdentitySource, StaticIdentity};
pub use permission_map::{BASELINE_PERMISSIONS, PermissionMap, Requirement, RequirementMode};
pub use permissions::{Permission, PermissionSet};
pub use policy::AccessPolicy;
pub use resolver::{PermissionResolver, Resolution, ResolutionRule, SuperAdminSource, RESOLUTION_RULES};
pub use roles::{DEFAULT_ADMIN_ROLES, DEFAULT_ROLE, Role, SUPER_ADMIN_ROLE};
pub use route_guard::{
    AuthState, GuardDecision, GuardOptions, LOGIN_ROUTE, Notice, RouteGuard, WAITING_APPROVAL_ROUTE,
};
pub use snapshot::AuthorizationSnapshot;
