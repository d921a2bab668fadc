//! Sync execution types: options, actions, events, and the batch result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keel_core::{AppHealth, ResourceKey};

use crate::backoff::Backoff;

/// Tunable parameters for the Sync Executor.
///
/// The defaults (5s base, 5m cap, 3 retries) are reasonable starting
/// points, not contracts; deployments override them per environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// How many times a retryable per-resource failure is retried.
    pub retry_limit: u32,
    /// Backoff schedule between retries.
    pub backoff: Backoff,
}

impl SyncOptions {
    /// Sets the retry limit.
    #[must_use]
    pub const fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Sets the backoff schedule.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// A schedule with no waiting, for tests and dry runs.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            retry_limit: 3,
            backoff: Backoff::new(Duration::ZERO, 1, Duration::ZERO),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            backoff: Backoff::default(),
        }
    }
}

/// The corrective action taken for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// Create a resource missing from live state.
    Create,
    /// Apply the desired spec over a modified resource.
    Update,
    /// Delete an extra resource (prune only).
    Delete,
}

impl SyncAction {
    /// Returns the action as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The outcome of one attempted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "result")]
pub enum ActionOutcome {
    /// The action succeeded.
    Succeeded,
    /// The action failed after exhausting its retries.
    Failed {
        /// The last error observed.
        error: String,
        /// Retries spent before giving up.
        retries: u32,
    },
    /// The action was not executed.
    Skipped {
        /// Why it was skipped.
        reason: String,
    },
}

impl ActionOutcome {
    /// Returns true if the action succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// One entry in a batch's per-action event stream. The reconciler
/// records the stream of the most recent batch in the Application's
/// status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// When the action finished.
    pub timestamp: DateTime<Utc>,
    /// The resource the action targeted.
    pub key: ResourceKey,
    /// What was attempted.
    pub action: SyncAction,
    /// How it ended.
    pub outcome: ActionOutcome,
}

impl SyncEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn now(key: ResourceKey, action: SyncAction, outcome: ActionOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            key,
            action,
            outcome,
        }
    }
}

/// The result of executing one sync batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// The revision the batch synced toward.
    pub revision: String,
    /// Resources created or updated successfully.
    pub applied: usize,
    /// Resources deleted successfully.
    pub deleted: usize,
    /// Resources that failed after exhausting retries.
    pub failed: usize,
    /// Resources skipped (cancellation or fatal batch halt).
    pub skipped: usize,
    /// Extra resources left in place because pruning is disabled.
    pub drift: Vec<ResourceKey>,
    /// Health the batch implies for the Application.
    pub health: AppHealth,
    /// True if a newer desired state superseded this batch mid-flight.
    pub cancelled: bool,
    /// Per-action event stream, in execution order.
    pub events: Vec<SyncEvent>,
}

impl SyncResult {
    /// Creates an empty result for a revision.
    #[must_use]
    pub fn new(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            applied: 0,
            deleted: 0,
            failed: 0,
            skipped: 0,
            drift: Vec::new(),
            health: AppHealth::Healthy,
            cancelled: false,
            events: Vec::new(),
        }
    }

    /// Returns true if every attempted action succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    /// Returns true if unforbidden drift remains (extras without prune).
    #[must_use]
    pub fn has_drift(&self) -> bool {
        !self.drift.is_empty()
    }
}
