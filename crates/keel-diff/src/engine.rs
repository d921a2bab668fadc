//! The diff computation.

use serde_json::Value;
use tracing::trace;

use keel_core::{DesiredState, LiveState};

use crate::normalize::normalize;
use crate::types::{Delta, DeltaKind, DeltaSet};

/// Computes the delta between desired and live state.
///
/// Every key declared in desired or present live is classified exactly
/// once. The result is sorted by (kind, namespace, name), so rerunning on
/// unchanged inputs yields an identical DeltaSet.
#[must_use]
pub fn diff(desired: &DesiredState, live: &LiveState) -> DeltaSet {
    let mut deltas = Vec::new();

    for manifest in desired.iter() {
        match live.get(&manifest.key) {
            None => deltas.push(Delta::new(manifest.key.clone(), DeltaKind::Missing)),
            Some(observed) => {
                if !spec_matches(&manifest.spec, &observed.spec) {
                    trace!(key = %manifest.key, "field-level mismatch");
                    deltas.push(Delta::new(manifest.key.clone(), DeltaKind::Modified));
                }
            }
        }
    }

    for observed in live.iter() {
        if !desired.contains(&observed.key) {
            deltas.push(Delta::new(observed.key.clone(), DeltaKind::Extra));
        }
    }

    DeltaSet::new(deltas)
}

/// Projection comparison of a desired spec against a live spec.
///
/// Returns true when every field the desired spec declares is present and
/// equal in the normalized live spec. Fields only the live spec carries do
/// not count as a mismatch: server-side apply leaves them untouched, so
/// treating them as drift would prevent convergence.
#[must_use]
pub fn spec_matches(desired: &Value, live: &Value) -> bool {
    projects_onto(&normalize(desired), &normalize(live))
}

fn projects_onto(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(k, v)| have.get(k).is_some_and(|lv| projects_onto(v, lv))),
        // Arrays and scalars must match exactly; partial list ownership is
        // out of scope.
        _ => desired == live,
    }
}
