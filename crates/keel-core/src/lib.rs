//! # keel-core
//!
//! Shared data model for the Keel GitOps reconciler.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//! Applications and their sync policy, resource manifests, desired- and
//! live-state snapshots, and the error taxonomy for cluster operations.
//! It also holds the trait seams to external systems (manifest source,
//! cluster control interface, metrics provider) plus in-memory reference
//! implementations used by tests and the CLI.
//!
//! ## Modules
//!
//! - [`types`]: Application, ResourceKey, Manifest, SyncPolicy, SyncStatus
//! - [`state`]: DesiredState and LiveState snapshots
//! - [`traits`]: seams to external collaborators
//! - [`error`]: the cluster/source error taxonomy
//! - [`memory`]: in-memory backends for tests and demos

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod state;
pub mod traits;
pub mod types;

pub use error::{ClusterError, ClusterResult, SourceError};
pub use state::{DesiredState, LiveState};
pub use traits::{ClusterInterface, ManifestSource, MetricsProvider, Sample, TimeRange};
pub use types::{
    AppHealth, Application, Manifest, ResourceKey, SyncPolicy, SyncStatus,
};
