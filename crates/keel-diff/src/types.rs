//! Delta classification types.

use serde::{Deserialize, Serialize};

use keel_core::{ResourceKey, SyncStatus};

/// How a resource key differs between desired and live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    /// Declared in desired state, absent from live state.
    Missing,
    /// Present live, absent from desired state.
    Extra,
    /// Present in both with a field-level mismatch.
    Modified,
}

impl DeltaKind {
    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Extra => "extra",
            Self::Modified => "modified",
        }
    }
}

impl std::fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One classified difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// The resource the difference applies to.
    pub key: ResourceKey,
    /// The classification.
    pub kind: DeltaKind,
}

impl Delta {
    /// Creates a new delta.
    #[must_use]
    pub const fn new(key: ResourceKey, kind: DeltaKind) -> Self {
        Self { key, kind }
    }
}

/// The full set of differences for one (desired, live) pair.
///
/// Entries are sorted by (kind, namespace, name) of the resource key, so
/// two DeltaSets built from the same inputs compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSet {
    deltas: Vec<Delta>,
}

impl DeltaSet {
    /// Builds a DeltaSet, sorting entries canonically.
    #[must_use]
    pub fn new(mut deltas: Vec<Delta>) -> Self {
        deltas.sort_by(|a, b| a.key.cmp(&b.key));
        Self { deltas }
    }

    /// Iterates deltas in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Delta> {
        self.deltas.iter()
    }

    /// Returns deltas of one classification, in canonical order.
    pub fn of_kind(&self, kind: DeltaKind) -> impl Iterator<Item = &Delta> {
        self.deltas.iter().filter(move |d| d.kind == kind)
    }

    /// Returns the number of deltas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Returns true if desired and live state match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// The sync status this DeltaSet implies.
    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        if self.is_empty() {
            SyncStatus::Synced
        } else {
            SyncStatus::OutOfSync
        }
    }
}

impl IntoIterator for DeltaSet {
    type Item = Delta;
    type IntoIter = std::vec::IntoIter<Delta>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.into_iter()
    }
}
