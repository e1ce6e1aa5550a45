// ─────────────────────────────────────────────────────────────────────────────
// Access Explanation (support/debugging)
// ─────────────────────────────────────────────────────────────────────────────

use serde::Serialize;

use crate::{AuthState, AuthorizationSnapshot, Requirement, RequirementMode};

/// What settled an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    Loading,
    Unauthenticated,
    SuperAdmin,
    SuperAdminEmail,
    PublicTarget,
    Requirement,
}

/// Detailed, serializable explanation of one access decision.
///
/// Answers "why was this allowed/denied?" without touching any store.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    /// Route or module tag being checked.
    pub target: String,

    pub granted: bool,

    pub basis: DecisionBasis,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Tokens the target requires (empty for public targets).
    pub required: Vec<String>,

    pub mode: RequirementMode,

    /// Required tokens the snapshot does not hold.
    pub missing: Vec<String>,

    /// Sorted tokens the snapshot holds.
    pub held: Vec<String>,
}

impl AccessExplanation {
    fn new(target: &str, basis: DecisionBasis, granted: bool, reason: String) -> Self {
        Self {
            target: target.to_string(),
            granted,
            basis,
            reason,
            required: Vec::new(),
            mode: RequirementMode::AnyOf,
            missing: Vec::new(),
            held: Vec::new(),
        }
    }
}

/// Explain a token-level decision for `target` under `state`.
///
/// `email_override` is consulted after the super-admin flag; route checks pass
/// `false`, offline admission passes whether the email is allow-listed.
pub fn explain_requirement(
    target: &str,
    requirement: Option<&Requirement>,
    state: AuthState<'_>,
    email_override: bool,
) -> AccessExplanation {
    let Some(snapshot) = state.snapshot() else {
        return AccessExplanation::new(
            target,
            DecisionBasis::Loading,
            false,
            "Authorization is still loading; access fails closed".to_string(),
        );
    };

    let mut explanation = explain_snapshot(target, requirement, snapshot, email_override);
    explanation.held = snapshot.permissions.to_sorted_vec();
    if let Some(req) = requirement {
        explanation.required = req.tokens.iter().map(|t| t.to_string()).collect();
        explanation.mode = req.mode;
    }
    explanation
}

fn explain_snapshot(
    target: &str,
    requirement: Option<&Requirement>,
    snapshot: &AuthorizationSnapshot,
    email_override: bool,
) -> AccessExplanation {
    if snapshot.is_super_admin {
        return AccessExplanation::new(
            target,
            DecisionBasis::SuperAdmin,
            true,
            "Super admin: every check succeeds".to_string(),
        );
    }

    if email_override {
        return AccessExplanation::new(
            target,
            DecisionBasis::SuperAdminEmail,
            true,
            "Email is on the super-admin allow-list".to_string(),
        );
    }

    let Some(req) = requirement else {
        return AccessExplanation::new(
            target,
            DecisionBasis::PublicTarget,
            true,
            format!("'{target}' has no permission requirement"),
        );
    };

    if !snapshot.is_authenticated() {
        return AccessExplanation::new(
            target,
            DecisionBasis::Unauthenticated,
            false,
            "No authenticated identity".to_string(),
        );
    }

    let granted = req.is_satisfied_by(&snapshot.permissions);
    let missing: Vec<String> = req
        .missing(&snapshot.permissions)
        .into_iter()
        .map(|p| p.to_string())
        .collect();

    let reason = match (granted, req.mode) {
        (true, RequirementMode::AnyOf) => format!(
            "Holds at least one of the required tokens for '{target}'"
        ),
        (true, RequirementMode::AllOf) => format!("Holds every required token for '{target}'"),
        (false, _) => format!("Missing required permission(s) for '{target}': {missing:?}"),
    };

    let mut explanation = AccessExplanation::new(target, DecisionBasis::Requirement, granted, reason);
    explanation.missing = missing;
    explanation
}
