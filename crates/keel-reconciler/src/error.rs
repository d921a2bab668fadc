//! Reconciler error types.

use thiserror::Error;

/// Errors from reconciler operations.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// No Application with the given name is registered.
    #[error("unknown application '{name}'")]
    UnknownApplication {
        /// The requested name.
        name: String,
    },

    /// An Application with the given name is already registered.
    #[error("application '{name}' is already registered")]
    DuplicateApplication {
        /// The conflicting name.
        name: String,
    },
}

/// Result alias for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcilerError>;
