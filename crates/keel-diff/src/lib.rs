//! # keel-diff
//!
//! Deterministic diff engine for the Keel reconciler.
//!
//! Given a [`DesiredState`](keel_core::DesiredState) and a
//! [`LiveState`](keel_core::LiveState), [`diff`] classifies every resource
//! key as `Missing`, `Extra`, or `Modified` and reports the result as a
//! [`DeltaSet`] sorted by (kind, namespace, name). Identical inputs always
//! yield an identical DeltaSet, independent of input iteration order.
//!
//! Comparison is structural on normalized specs: server-populated fields
//! are stripped first (see [`normalize`]), and a resource counts as
//! `Modified` only when a field the desired spec declares is absent or
//! different live. Live-only fields are left alone by server-side apply,
//! so they are not drift.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod engine;
pub mod normalize;
mod types;

pub use engine::{diff, spec_matches};
pub use normalize::normalize;
pub use types::{Delta, DeltaKind, DeltaSet};
