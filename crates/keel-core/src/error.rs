//! Error taxonomy for the reconciliation core.

use thiserror::Error;

/// Errors local to the core data model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid Application definition.
    #[error("invalid application: {reason}")]
    InvalidApplication {
        /// The reason the definition is invalid.
        reason: String,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors returned by the cluster control interface.
///
/// The variants encode the propagation policy of the loop: transient and
/// conflict errors are retryable, policy violations are reported as drift,
/// and fatal configuration errors halt the Application until corrected.
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// Network or API timeout; retried with backoff.
    #[error("transient infrastructure error: {reason}")]
    Transient {
        /// What failed.
        reason: String,
    },

    /// Concurrent modification detected; retried after re-reading live state.
    #[error("conflict on {key}")]
    Conflict {
        /// The resource that was concurrently modified.
        key: String,
    },

    /// The requested action is forbidden by policy; not retried.
    #[error("policy violation: {reason}")]
    PolicyViolation {
        /// Why the action was refused.
        reason: String,
    },

    /// Malformed desired state; the Application is halted until corrected.
    #[error("fatal configuration error: {reason}")]
    FatalConfig {
        /// What is malformed.
        reason: String,
    },

    /// The resource does not exist.
    #[error("resource not found: {key}")]
    NotFound {
        /// The missing resource.
        key: String,
    },
}

impl ClusterError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    /// Creates a conflict error for a resource key.
    #[must_use]
    pub fn conflict(key: impl std::fmt::Display) -> Self {
        Self::Conflict {
            key: key.to_string(),
        }
    }

    /// Returns true if the operation may be retried.
    ///
    /// Transient and conflict errors are retryable; policy violations and
    /// fatal configuration errors are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Conflict { .. })
    }

    /// Returns true if live state should be re-read before retrying.
    #[must_use]
    pub const fn needs_reread(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Errors returned by the desired-state source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The revision could not be fetched; retryable on the next poll.
    #[error("fetch failed for {revision}: {reason}")]
    FetchFailed {
        /// The revision that was requested.
        revision: String,
        /// What went wrong.
        reason: String,
    },

    /// The manifests at the revision are malformed; sync is halted.
    #[error("malformed manifests at {revision}: {reason}")]
    Malformed {
        /// The revision holding the bad manifests.
        revision: String,
        /// What is malformed.
        reason: String,
    },
}

impl SourceError {
    /// Returns true if the error is fatal for the Application until the
    /// desired state changes.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}
