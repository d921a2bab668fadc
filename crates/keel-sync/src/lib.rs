//! # keel-sync
//!
//! The Sync Executor: turns a [`DeltaSet`](keel_diff::DeltaSet) into
//! corrective cluster actions under an Application's prune/self-heal
//! policy.
//!
//! - Creates and updates run before deletes, to avoid transient
//!   unavailability.
//! - Extras are deleted only when the policy allows pruning; otherwise
//!   they are reported as drift.
//! - A single resource's failure never aborts the batch. Retryable
//!   failures back off exponentially up to a bounded retry count, after
//!   which the result is marked degraded and surfaced instead of retried
//!   further.
//! - An in-flight batch observes the Application's desired-state
//!   generation and stops between resources when superseded (latest
//!   wins); the in-progress apply always finishes.
//! - Every attempted action emits a [`SyncEvent`]; the batch result
//!   carries the full stream so the caller can record it alongside the
//!   Application's status.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
mod executor;
mod types;

pub use backoff::Backoff;
pub use executor::SyncExecutor;
pub use types::{ActionOutcome, SyncAction, SyncEvent, SyncOptions, SyncResult};
