//! # keel-reconciler
//!
//! The control loop tying the other crates together: it polls each
//! Application's manifest source, reads live cluster state fresh, diffs
//! the two, and syncs when policy allows — one in-flight sync per
//! Application, latest desired state wins.
//!
//! Status per Application lives in a [`StatusStore`], which doubles as
//! the input to alert evaluation when alerting is attached via
//! [`Reconciler::with_alerting`].
//!
//! # Example
//!
//! ```rust
//! use keel_core::memory::{InMemoryCluster, StaticManifestSource};
//! use keel_core::{Application, Manifest, ResourceKey, SyncPolicy, SyncStatus};
//! use keel_reconciler::{Reconciler, ReconcilerConfig};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let source = StaticManifestSource::new();
//! source.set("web", "rev-1", vec![Manifest::new(
//!     ResourceKey::new("Deployment", "default", "web"),
//!     json!({"replicas": 3}),
//! )]);
//!
//! let reconciler = Reconciler::new(
//!     source,
//!     InMemoryCluster::new(),
//!     ReconcilerConfig::immediate(),
//! );
//! let app = Application::new("web", "https://git.example.com/deploy.git", "apps", "main", "default")
//!     .unwrap()
//!     .with_policy(SyncPolicy::automated());
//! reconciler.add_application(app).unwrap();
//!
//! let status = reconciler.reconcile("web").await.unwrap();
//! assert_eq!(status.sync_status, SyncStatus::Synced);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod controller;
mod error;
mod status;

pub use config::ReconcilerConfig;
pub use controller::Reconciler;
pub use error::{ReconcilerError, Result};
pub use status::{AppStatus, StatusStore};
