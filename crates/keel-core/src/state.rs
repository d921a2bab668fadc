//! Desired- and live-state snapshots.
//!
//! A [`DesiredState`] is an immutable snapshot of the manifests resolved
//! from a repository revision at a point in time; it is superseded
//! wholesale on each poll. A [`LiveState`] is the set of resources actually
//! observed in the cluster, read fresh per reconciliation cycle and never
//! cached across cycles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Manifest, ResourceKey};

/// An immutable snapshot of desired state at a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    /// The resolved revision (commit hash or symbolic ref).
    pub revision: String,
    /// Monotonically increasing generation assigned by the reconciler.
    /// A newer generation supersedes an in-flight sync (latest wins).
    pub generation: u64,
    /// Manifests keyed by resource identity, sorted canonically.
    manifests: BTreeMap<ResourceKey, Manifest>,
}

impl DesiredState {
    /// Builds a snapshot from a set of manifests.
    ///
    /// Later duplicates of the same key replace earlier ones.
    #[must_use]
    pub fn new(revision: impl Into<String>, generation: u64, manifests: Vec<Manifest>) -> Self {
        let manifests = manifests
            .into_iter()
            .map(|m| (m.key.clone(), m))
            .collect();
        Self {
            revision: revision.into(),
            generation,
            manifests,
        }
    }

    /// Returns the manifest for a key, if declared.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&Manifest> {
        self.manifests.get(key)
    }

    /// Iterates manifests in canonical (kind, namespace, name) order.
    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.values()
    }

    /// Returns the number of declared manifests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Returns true if no manifests are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Returns true if the key is declared in this snapshot.
    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.manifests.contains_key(key)
    }
}

/// The set of live resources observed in the cluster for one namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
    resources: BTreeMap<ResourceKey, Manifest>,
}

impl LiveState {
    /// Builds a live snapshot from observed resources.
    #[must_use]
    pub fn new(resources: Vec<Manifest>) -> Self {
        Self {
            resources: resources
                .into_iter()
                .map(|m| (m.key.clone(), m))
                .collect(),
        }
    }

    /// Returns the live resource for a key, if present.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&Manifest> {
        self.resources.get(key)
    }

    /// Iterates live resources in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.resources.values()
    }

    /// Returns the number of live resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resources were observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
