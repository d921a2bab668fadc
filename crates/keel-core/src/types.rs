//! Core types for the reconciliation loop.
//!
//! This module provides the fundamental types shared across the workspace:
//! - [`ResourceKey`]: identity of a cluster resource
//! - [`Manifest`]: one declarative resource (key plus spec)
//! - [`Application`]: a desired-state location bound to a destination
//! - [`SyncPolicy`]: prune / self-heal behavior for an Application
//! - [`SyncStatus`]: derived sync state, computed and never stored
//! - [`AppHealth`]: user-visible health of an Application

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Identity of a cluster resource: (kind, namespace, name).
///
/// Ordering is lexicographic over (kind, namespace, name), which is the
/// canonical reporting order for deltas and events.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// The resource kind (e.g. `Deployment`, `ConfigMap`).
    pub kind: String,
    /// The namespace the resource lives in.
    pub namespace: String,
    /// The resource name.
    pub name: String,
}

impl ResourceKey {
    /// Creates a new resource key.
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A single declarative resource manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// The identity of the resource.
    pub key: ResourceKey,
    /// The declared spec as structured JSON.
    pub spec: serde_json::Value,
}

impl Manifest {
    /// Creates a new manifest.
    #[must_use]
    pub const fn new(key: ResourceKey, spec: serde_json::Value) -> Self {
        Self { key, spec }
    }
}

/// Prune / self-heal policy for an Application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    /// Whether live resources absent from desired state may be deleted.
    #[serde(default)]
    pub prune: bool,
    /// Whether drift is corrected automatically, without a manual trigger.
    #[serde(default)]
    pub self_heal: bool,
}

impl SyncPolicy {
    /// A policy that neither prunes nor self-heals (manual sync only).
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            prune: false,
            self_heal: false,
        }
    }

    /// A fully automated policy: self-heal with pruning enabled.
    #[must_use]
    pub const fn automated() -> Self {
        Self {
            prune: true,
            self_heal: true,
        }
    }
}

/// An Application binds one desired-state location to one destination.
///
/// Applications are created from configuration and mutated only by policy
/// changes; the reconciliation loop itself never rewrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Unique Application name.
    pub name: String,
    /// URL of the repository holding the declarative manifests.
    pub repo_url: String,
    /// Path within the repository.
    pub path: String,
    /// The revision to track (branch, tag, or pinned commit).
    pub target_revision: String,
    /// The namespace resources are reconciled into.
    pub destination_namespace: String,
    /// Prune / self-heal policy.
    #[serde(default)]
    pub sync_policy: SyncPolicy,
}

impl Application {
    /// Maximum allowed length for Application names.
    pub const MAX_NAME_LENGTH: usize = 253;

    /// Creates a new Application with a manual sync policy.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidApplication` if the name or repository
    /// URL is empty, or the name exceeds [`Self::MAX_NAME_LENGTH`].
    pub fn new(
        name: impl Into<String>,
        repo_url: impl Into<String>,
        path: impl Into<String>,
        target_revision: impl Into<String>,
        destination_namespace: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::InvalidApplication {
                reason: "application name cannot be empty".to_string(),
            });
        }
        if name.len() > Self::MAX_NAME_LENGTH {
            return Err(CoreError::InvalidApplication {
                reason: format!(
                    "application name exceeds maximum length of {} characters",
                    Self::MAX_NAME_LENGTH
                ),
            });
        }
        let repo_url = repo_url.into();
        if repo_url.is_empty() {
            return Err(CoreError::InvalidApplication {
                reason: "repository URL cannot be empty".to_string(),
            });
        }

        Ok(Self {
            name,
            repo_url,
            path: path.into(),
            target_revision: target_revision.into(),
            destination_namespace: destination_namespace.into(),
            sync_policy: SyncPolicy::manual(),
        })
    }

    /// Sets the sync policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }
}

/// Derived sync state of an Application.
///
/// Always a function of the latest (desired, live) snapshot pair at
/// evaluation time; never set independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Desired and live state match.
    Synced,
    /// At least one delta exists between desired and live state.
    OutOfSync,
    /// No snapshot pair has been evaluated yet.
    #[default]
    Unknown,
}

impl SyncStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::OutOfSync => "outofsync",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-visible health of an Application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum AppHealth {
    /// All resources applied; nothing in flight.
    #[default]
    Healthy,
    /// A sync is running or retries are still within bounds.
    Progressing,
    /// A resource exhausted its retries or the desired state is invalid.
    Degraded {
        /// The last error message observed.
        message: String,
        /// How many retries were spent before degrading.
        retry_count: u32,
    },
}

impl AppHealth {
    /// Returns true if the Application is degraded.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Creates a degraded health value.
    #[must_use]
    pub fn degraded(message: impl Into<String>, retry_count: u32) -> Self {
        Self::Degraded {
            message: message.into(),
            retry_count,
        }
    }
}

impl std::fmt::Display for AppHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Progressing => write!(f, "progressing"),
            Self::Degraded { message, .. } => write!(f, "degraded: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod key_tests {
        use super::*;

        #[test]
        fn key_display() {
            let key = ResourceKey::new("Deployment", "default", "web");
            assert_eq!(key.to_string(), "Deployment/default/web");
        }

        #[test]
        fn key_ordering_is_kind_namespace_name() {
            let a = ResourceKey::new("ConfigMap", "default", "zzz");
            let b = ResourceKey::new("Deployment", "aaa", "aaa");
            let c = ResourceKey::new("Deployment", "default", "aaa");
            let d = ResourceKey::new("Deployment", "default", "web");

            let mut keys = vec![d.clone(), b.clone(), a.clone(), c.clone()];
            keys.sort();
            assert_eq!(keys, vec![a, b, c, d]);
        }

        #[test]
        fn key_serialization_roundtrip() {
            let key = ResourceKey::new("Service", "prod", "api");
            let parsed: ResourceKey =
                serde_json::from_str(&serde_json::to_string(&key).unwrap()).unwrap();
            assert_eq!(parsed, key);
        }
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn manual_policy() {
            let policy = SyncPolicy::manual();
            assert!(!policy.prune);
            assert!(!policy.self_heal);
        }

        #[test]
        fn automated_policy() {
            let policy = SyncPolicy::automated();
            assert!(policy.prune);
            assert!(policy.self_heal);
        }

        #[test]
        fn policy_defaults_to_manual() {
            assert_eq!(SyncPolicy::default(), SyncPolicy::manual());
        }

        #[test]
        fn policy_fields_default_when_absent_from_json() {
            let policy: SyncPolicy = serde_json::from_str("{}").unwrap();
            assert_eq!(policy, SyncPolicy::manual());
        }
    }

    mod application_tests {
        use super::*;

        #[test]
        fn create_application() {
            let app = Application::new(
                "web",
                "https://git.example.com/infra.git",
                "apps/web",
                "main",
                "default",
            );
            assert!(app.is_ok());
            let app = app.unwrap();
            assert_eq!(app.name, "web");
            assert_eq!(app.target_revision, "main");
            assert_eq!(app.sync_policy, SyncPolicy::manual());
        }

        #[test]
        fn empty_name_fails() {
            let app = Application::new("", "https://git.example.com/i.git", "", "main", "default");
            assert!(matches!(app, Err(CoreError::InvalidApplication { .. })));
        }

        #[test]
        fn overlong_name_fails() {
            let name = "a".repeat(Application::MAX_NAME_LENGTH + 1);
            let app = Application::new(name, "https://git.example.com/i.git", "", "main", "ns");
            assert!(matches!(app, Err(CoreError::InvalidApplication { .. })));
        }

        #[test]
        fn empty_repo_url_fails() {
            let app = Application::new("web", "", "", "main", "default");
            assert!(matches!(app, Err(CoreError::InvalidApplication { .. })));
        }

        #[test]
        fn with_policy() {
            let app = Application::new("web", "https://git.example.com/i.git", "", "main", "ns")
                .unwrap()
                .with_policy(SyncPolicy::automated());
            assert!(app.sync_policy.prune);
            assert!(app.sync_policy.self_heal);
        }

        #[test]
        fn application_serialization_roundtrip() {
            let app = Application::new(
                "web",
                "https://git.example.com/infra.git",
                "apps/web",
                "v1.2.0",
                "prod",
            )
            .unwrap()
            .with_policy(SyncPolicy::automated());

            let parsed: Application =
                serde_json::from_str(&serde_json::to_string(&app).unwrap()).unwrap();
            assert_eq!(parsed, app);
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn status_as_str() {
            assert_eq!(SyncStatus::Synced.as_str(), "synced");
            assert_eq!(SyncStatus::OutOfSync.as_str(), "outofsync");
            assert_eq!(SyncStatus::Unknown.as_str(), "unknown");
        }

        #[test]
        fn status_default_is_unknown() {
            assert_eq!(SyncStatus::default(), SyncStatus::Unknown);
        }
    }

    mod health_tests {
        use super::*;

        #[test]
        fn degraded_carries_message_and_count() {
            let health = AppHealth::degraded("apply timed out", 3);
            assert!(health.is_degraded());
            assert_eq!(health.to_string(), "degraded: apply timed out");
        }

        #[test]
        fn healthy_is_not_degraded() {
            assert!(!AppHealth::Healthy.is_degraded());
            assert!(!AppHealth::Progressing.is_degraded());
        }
    }

    mod manifest_tests {
        use super::*;

        #[test]
        fn manifest_roundtrip() {
            let manifest = Manifest::new(
                ResourceKey::new("Deployment", "default", "web"),
                json!({"replicas": 3}),
            );
            let parsed: Manifest =
                serde_json::from_str(&serde_json::to_string(&manifest).unwrap()).unwrap();
            assert_eq!(parsed, manifest);
        }
    }
}
