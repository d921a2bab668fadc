//! Per-Application status tracking.
//!
//! The [`StatusStore`] is the user-visible surface of the control loop:
//! one [`AppStatus`] per Application, replaced wholesale after each
//! reconciliation cycle. Its snapshots feed the alert evaluator, which
//! is how "stuck retrying" becomes observable instead of silent.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use keel_alerts::AppStatusSnapshot;
use keel_core::{AppHealth, ResourceKey, SyncStatus};
use keel_sync::SyncEvent;

/// The reconciler's view of one Application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    /// Sync status computed from the last (desired, live) pair.
    pub sync_status: SyncStatus,
    /// Health after the last cycle.
    pub health: AppHealth,
    /// Live resources left in place because pruning is disabled.
    pub drift: Vec<ResourceKey>,
    /// The last error observed, if the last cycle did not complete.
    pub last_error: Option<String>,
    /// The revision of the last successful sync.
    pub last_synced_revision: Option<String>,
    /// When the Application was last reconciled.
    pub last_reconciled_at: Option<DateTime<Utc>>,
    /// Per-action events from the most recent sync batch, in execution
    /// order. Empty until the first sync runs.
    pub last_sync_events: Vec<SyncEvent>,
}

impl AppStatus {
    /// Returns true if drift is present.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        !self.drift.is_empty()
    }
}

/// Shared store of per-Application status.
///
/// Cloning shares the underlying map, so the control loop can write
/// while the alert loop and callers read.
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    inner: Arc<RwLock<HashMap<String, AppStatus>>>,
}

impl StatusStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status for an Application, if tracked.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<AppStatus> {
        self.inner.read().get(name).cloned()
    }

    /// Replaces the status for an Application.
    pub fn set(&self, name: impl Into<String>, status: AppStatus) {
        self.inner.write().insert(name.into(), status);
    }

    /// Mutates the status for an Application in place, inserting a
    /// default first if absent.
    pub fn update<F>(&self, name: &str, f: F)
    where
        F: FnOnce(&mut AppStatus),
    {
        let mut inner = self.inner.write();
        f(inner.entry(name.to_string()).or_default());
    }

    /// Removes the status for an Application.
    pub fn remove(&self, name: &str) {
        self.inner.write().remove(name);
    }

    /// Returns the tracked Application names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds the evaluation input for the alert evaluator.
    #[must_use]
    pub fn snapshots(&self) -> Vec<AppStatusSnapshot> {
        self.inner
            .read()
            .iter()
            .map(|(name, status)| {
                AppStatusSnapshot::new(
                    name.clone(),
                    status.sync_status,
                    status.health.clone(),
                    status.drift.len(),
                )
            })
            .collect()
    }
}
