//! Error types for the alerting crate.

use thiserror::Error;

/// Errors that can occur in the alerting system.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid alert rule configuration.
    #[error("invalid alert rule: {reason}")]
    InvalidRule {
        /// The reason the rule is invalid.
        reason: String,
    },

    /// Alert rule with the given id was not found.
    #[error("rule not found: {id}")]
    RuleNotFound {
        /// The rule id that was not found.
        id: String,
    },

    /// Invalid inhibition rule configuration.
    #[error("invalid inhibition rule: {reason}")]
    InvalidInhibition {
        /// The reason the rule is invalid.
        reason: String,
    },

    /// Notification delivery failed.
    #[error("notification failed: {reason}")]
    NotificationFailed {
        /// The reason the notification failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
