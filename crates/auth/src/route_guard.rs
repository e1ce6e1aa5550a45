//! Route-level access decisions for navigation.

use serde::Serialize;

use crate::{AccessPolicy, AuthorizationSnapshot, Permission, Requirement, RequirementMode};

/// Screen shown to unauthenticated users.
pub const LOGIN_ROUTE: &str = "/login";

/// Screen shown to authenticated users that lack access.
pub const WAITING_APPROVAL_ROUTE: &str = "/waiting-approval";

/// Authorization state as seen by navigation.
#[derive(Debug, Clone, Copy)]
pub enum AuthState<'a> {
    /// Resolution has not completed yet.
    Loading,
    Resolved(&'a AuthorizationSnapshot),
}

impl<'a> AuthState<'a> {
    pub fn snapshot(&self) -> Option<&'a AuthorizationSnapshot> {
        match self {
            AuthState::Loading => None,
            AuthState::Resolved(s) => Some(s),
        }
    }
}

/// User-facing notice emitted alongside a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn awaiting_approval() -> Self {
        Self {
            title: "Aguardando Aprovação".to_string(),
            description: "Sua conta precisa ser aprovada por um administrador.".to_string(),
        }
    }
}

/// What navigation should do with a guarded screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Still loading: render nothing and do not redirect yet.
    Pending,
    Allow,
    RedirectToLogin { to: &'static str },
    RedirectToApproval {
        to: &'static str,
        notice: Option<Notice>,
    },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Options for the higher-level guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOptions {
    pub required: Vec<Permission>,
    pub mode: RequirementMode,
    pub show_notice: bool,
}

impl GuardOptions {
    pub fn requiring<I, P>(permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self {
            required: permissions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn all_of(mut self) -> Self {
        self.mode = RequirementMode::AllOf;
        self
    }

    pub fn silent(mut self) -> Self {
        self.show_notice = false;
        self
    }
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            required: Vec::new(),
            mode: RequirementMode::AnyOf,
            show_notice: true,
        }
    }
}

impl From<&Requirement> for GuardOptions {
    fn from(req: &Requirement) -> Self {
        Self {
            required: req.tokens.clone(),
            mode: req.mode,
            show_notice: true,
        }
    }
}

/// Decides whether navigation targets are reachable.
///
/// Fails closed while loading. Denial is a decision, never an error.
#[derive(Debug, Clone, Copy)]
pub struct RouteGuard<'a> {
    policy: &'a AccessPolicy,
    state: AuthState<'a>,
}

impl<'a> RouteGuard<'a> {
    pub fn new(policy: &'a AccessPolicy, state: AuthState<'a>) -> Self {
        Self { policy, state }
    }

    /// Token-level check: super admin → every route; unmapped → public.
    pub fn can_access_route(&self, route: &str) -> bool {
        let Some(snapshot) = self.state.snapshot() else {
            return false;
        };
        if snapshot.is_super_admin {
            return true;
        }
        match self.policy.map().route(route) {
            None => true,
            Some(req) => req.is_satisfied_by(&snapshot.permissions),
        }
    }

    /// Mapped routes the current snapshot can reach (sorted).
    pub fn accessible_routes(&self) -> Vec<&'a str> {
        let map = self.policy.map();
        match self.state.snapshot() {
            None => Vec::new(),
            Some(s) if s.is_super_admin => map.routes().map(|(r, _)| r).collect(),
            Some(_) => map
                .routes()
                .map(|(r, _)| r)
                .filter(|r| self.can_access_route(r))
                .collect(),
        }
    }

    /// Higher-level guard for a screen with explicit requirements.
    ///
    /// On top of the token check this admits any role on the policy's
    /// administrative allow-list, regardless of tokens. That bypass is
    /// coarser than the token check.
    pub fn guard(&self, options: &GuardOptions) -> GuardDecision {
        let Some(snapshot) = self.state.snapshot() else {
            return GuardDecision::Pending;
        };
        if !snapshot.is_authenticated() {
            tracing::debug!("route guard: no identity, redirecting to login");
            return GuardDecision::RedirectToLogin { to: LOGIN_ROUTE };
        }
        if self.passes(snapshot, options) {
            return GuardDecision::Allow;
        }

        tracing::debug!(
            user_id = ?snapshot.user_id,
            role = ?snapshot.role,
            required = ?options.required,
            "route guard: access denied, redirecting to approval"
        );
        GuardDecision::RedirectToApproval {
            to: WAITING_APPROVAL_ROUTE,
            notice: options.show_notice.then(Notice::awaiting_approval),
        }
    }

    /// [`Self::guard`] with requirements taken from the permission map.
    pub fn guard_route(&self, route: &str) -> GuardDecision {
        let options = self
            .policy
            .map()
            .route(route)
            .map(GuardOptions::from)
            .unwrap_or_default();
        self.guard(&options)
    }

    fn passes(&self, snapshot: &AuthorizationSnapshot, options: &GuardOptions) -> bool {
        if snapshot.is_super_admin {
            return true;
        }
        if snapshot
            .role
            .as_ref()
            .is_some_and(|r| self.policy.is_admin_role(r))
        {
            return true;
        }
        if options.required.is_empty() {
            return true;
        }
        match options.mode {
            RequirementMode::AnyOf => snapshot.permissions.contains_any(&options.required),
            RequirementMode::AllOf => snapshot.permissions.contains_all(&options.required),
        }
    }
}
