//! Runtime configuration for the guard layer.

use std::path::PathBuf;

use chrono::Duration;
use fieldguard_auth::{AccessPolicy, DEFAULT_ADMIN_ROLES, PermissionMap, RequirementMode, Role};
use fieldguard_core::DEFAULT_LOCAL_ID_PREFIX;
use serde::{Deserialize, Serialize};

/// Guard configuration.
///
/// Defaults match production behavior; [`GuardConfig::from_env`] overlays
/// `FIELDGUARD_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Emails that are always super admin (matched case-insensitively).
    pub super_admin_emails: Vec<String>,

    /// Roles that pass the higher-level route guard regardless of tokens.
    pub admin_roles: Vec<String>,

    /// Offline snapshot freshness window, in hours.
    pub freshness_window_hours: i64,

    /// How multi-token requirements are satisfied.
    pub requirement_mode: RequirementMode,

    /// Failed sync attempts after which a queued record is retired.
    pub max_sync_attempts: u32,

    /// Prefix for locally generated record ids.
    pub local_id_prefix: String,

    /// SQLite database path (`None` → platform data dir).
    pub sqlite_path: Option<PathBuf>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            super_admin_emails: Vec::new(),
            admin_roles: DEFAULT_ADMIN_ROLES.iter().map(|r| r.to_string()).collect(),
            freshness_window_hours: 24,
            requirement_mode: RequirementMode::AnyOf,
            max_sync_attempts: 3,
            local_id_prefix: DEFAULT_LOCAL_ID_PREFIX.to_string(),
            sqlite_path: None,
        }
    }
}

impl GuardConfig {
    /// Defaults overlaid with `FIELDGUARD_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary lookup (environment, test maps).
    ///
    /// Invalid values are logged and the current value is kept.
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FIELDGUARD_SUPER_ADMIN_EMAILS") {
            self.super_admin_emails = split_list(&raw);
        }
        if let Some(raw) = lookup("FIELDGUARD_ADMIN_ROLES") {
            self.admin_roles = split_list(&raw);
        }
        if let Some(raw) = lookup("FIELDGUARD_FRESHNESS_HOURS") {
            match raw.trim().parse::<i64>() {
                Ok(hours) if hours > 0 => self.freshness_window_hours = hours,
                _ => tracing::warn!("ignoring invalid FIELDGUARD_FRESHNESS_HOURS={raw:?}"),
            }
        }
        if let Some(raw) = lookup("FIELDGUARD_REQUIREMENT_MODE") {
            match raw.parse::<RequirementMode>() {
                Ok(mode) => self.requirement_mode = mode,
                Err(err) => tracing::warn!("ignoring FIELDGUARD_REQUIREMENT_MODE: {err}"),
            }
        }
        if let Some(raw) = lookup("FIELDGUARD_MAX_SYNC_ATTEMPTS") {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => self.max_sync_attempts = n,
                _ => tracing::warn!("ignoring invalid FIELDGUARD_MAX_SYNC_ATTEMPTS={raw:?}"),
            }
        }
        if let Some(raw) = lookup("FIELDGUARD_DB_PATH").filter(|p| !p.trim().is_empty()) {
            self.sqlite_path = Some(PathBuf::from(raw));
        }
        self
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::hours(self.freshness_window_hours)
    }

    /// Access policy built from the standard tables and this configuration.
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(
            PermissionMap::standard().with_mode(self.requirement_mode),
            &self.super_admin_emails,
            self.admin_roles.iter().map(|r| Role::new(r.clone())),
        )
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.freshness_window(), Duration::hours(24));
        assert_eq!(config.max_sync_attempts, 3);
        assert_eq!(config.local_id_prefix, "temp_");
        assert!(config.super_admin_emails.is_empty());
    }

    #[test]
    fn overlays_valid_values() {
        let config = GuardConfig::default().overlay(lookup(&[
            ("FIELDGUARD_SUPER_ADMIN_EMAILS", "super@x.com, Boss@X.com ,"),
            ("FIELDGUARD_FRESHNESS_HOURS", "12"),
            ("FIELDGUARD_REQUIREMENT_MODE", "all"),
            ("FIELDGUARD_DB_PATH", "/tmp/fg.db"),
        ]));

        assert_eq!(config.super_admin_emails, vec!["super@x.com", "Boss@X.com"]);
        assert_eq!(config.freshness_window_hours, 12);
        assert_eq!(config.requirement_mode, RequirementMode::AllOf);
        assert_eq!(config.sqlite_path, Some(PathBuf::from("/tmp/fg.db")));

        let policy = config.access_policy();
        assert!(policy.is_super_admin_email("boss@x.com"));
    }

    #[test]
    fn keeps_defaults_on_invalid_values() {
        let config = GuardConfig::default().overlay(lookup(&[
            ("FIELDGUARD_FRESHNESS_HOURS", "soon"),
            ("FIELDGUARD_MAX_SYNC_ATTEMPTS", "0"),
            ("FIELDGUARD_REQUIREMENT_MODE", "most"),
        ]));

        assert_eq!(config, GuardConfig::default());
    }

    #[test]
    fn deserializes_partial_config() {
        let config: GuardConfig =
            serde_json::from_str(r#"{"freshness_window_hours": 48, "requirement_mode": "all_of"}"#)
                .unwrap();
        assert_eq!(config.freshness_window_hours, 48);
        assert_eq!(config.requirement_mode, RequirementMode::AllOf);
        assert_eq!(config.max_sync_attempts, 3);
    }
}
