//! Trait seams to external collaborators.
//!
//! The reconciliation core is agnostic to what backs these interfaces: a
//! real Git transport, Kubernetes API server, or time-series store can be
//! substituted without touching the loop, provided the capability set is
//! preserved.

use chrono::{DateTime, Duration, Utc};

use crate::error::{ClusterResult, SourceError};
use crate::types::{Manifest, ResourceKey};

/// Manifests resolved from a desired-state source at a revision.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedManifests {
    /// The concrete revision the manifests were resolved at.
    pub revision: String,
    /// The resolved manifest set.
    pub manifests: Vec<Manifest>,
}

/// A version-controlled desired-state source.
///
/// Polled, never pushed to. Implementations resolve the Application's
/// `{repo_url, path, target_revision}` to a manifest set.
pub trait ManifestSource: Send + Sync {
    /// Fetches the manifest set for an Application's tracked revision.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::FetchFailed`] for retryable transport
    /// failures and [`SourceError::Malformed`] when the manifests at the
    /// revision cannot be used, which halts the Application.
    fn fetch(&self, app: &crate::types::Application) -> Result<ResolvedManifests, SourceError>;
}

/// The cluster control interface the Sync Executor depends on.
///
/// `list` is read-only and safely concurrent; `apply` and `delete` are
/// serialized per Application by the reconciler.
pub trait ClusterInterface: Send + Sync {
    /// Lists live resources in a namespace, optionally filtered by kind.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ClusterError`] from the taxonomy; `Transient`
    /// failures are retried on the next cycle.
    fn list(&self, namespace: &str, kind: Option<&str>) -> ClusterResult<Vec<Manifest>>;

    /// Creates or updates a resource with the given spec.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ClusterError`]; retryability is decided by the
    /// caller via [`crate::ClusterError::is_retryable`].
    fn apply(&self, manifest: &Manifest) -> ClusterResult<()>;

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ClusterError`]; deleting an absent resource is
    /// `NotFound`.
    fn delete(&self, key: &ResourceKey) -> ClusterResult<()>;
}

/// A single metric sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// When the sample was recorded.
    pub timestamp: DateTime<Utc>,
    /// The sampled value.
    pub value: f64,
}

impl Sample {
    /// Creates a sample at the current time.
    #[must_use]
    pub fn now(value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            value,
        }
    }
}

/// A half-open time range `[start, end)` for metric queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive start of the range.
    pub start: DateTime<Utc>,
    /// Exclusive end of the range.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// The range covering the last `minutes` minutes.
    #[must_use]
    pub fn last_minutes(minutes: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::minutes(minutes),
            end,
        }
    }

    /// Returns true if the timestamp falls within the range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// An external time-series query interface for alert rule conditions.
///
/// This is a consumed capability; the store itself is not owned by the
/// core.
pub trait MetricsProvider: Send + Sync {
    /// Evaluates a query expression over a time range.
    fn query(&self, expression: &str, range: TimeRange) -> Vec<Sample>;
}
