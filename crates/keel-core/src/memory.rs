//! In-memory reference backends for tests and demos.
//!
//! [`InMemoryCluster`] implements [`ClusterInterface`] over a shared map
//! and supports scripted fault injection so retry and degradation paths
//! can be exercised deterministically. [`StaticManifestSource`] serves a
//! fixed manifest set per Application, and [`StaticMetrics`] serves fixed
//! per-expression samples.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{ClusterError, ClusterResult, SourceError};
use crate::traits::{
    ClusterInterface, ManifestSource, MetricsProvider, ResolvedManifests, Sample, TimeRange,
};
use crate::types::{Application, Manifest, ResourceKey};

/// An in-memory cluster backend.
///
/// Cloning shares the underlying state, so a test can hold one handle
/// while the executor mutates through another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    resources: Arc<RwLock<BTreeMap<ResourceKey, Manifest>>>,
    faults: Arc<RwLock<HashMap<ResourceKey, VecDeque<ClusterError>>>>,
}

impl InMemoryCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the cluster with pre-existing resources.
    #[must_use]
    pub fn with_resources(resources: Vec<Manifest>) -> Self {
        let cluster = Self::new();
        {
            let mut map = cluster.resources.write();
            for manifest in resources {
                map.insert(manifest.key.clone(), manifest);
            }
        }
        cluster
    }

    /// Queues errors to be returned by the next writes touching `key`.
    ///
    /// Each queued error is consumed by one `apply` or `delete` call; once
    /// the queue is drained the operation succeeds again.
    pub fn inject_faults(&self, key: &ResourceKey, errors: Vec<ClusterError>) {
        let mut faults = self.faults.write();
        faults.entry(key.clone()).or_default().extend(errors);
    }

    /// Returns the current resource for a key.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<Manifest> {
        self.resources.read().get(key).cloned()
    }

    /// Returns the number of resources in the cluster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Returns true if the cluster holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    fn take_fault(&self, key: &ResourceKey) -> Option<ClusterError> {
        let mut faults = self.faults.write();
        let queue = faults.get_mut(key)?;
        let fault = queue.pop_front();
        if queue.is_empty() {
            faults.remove(key);
        }
        fault
    }
}

impl ClusterInterface for InMemoryCluster {
    fn list(&self, namespace: &str, kind: Option<&str>) -> ClusterResult<Vec<Manifest>> {
        let resources = self.resources.read();
        Ok(resources
            .values()
            .filter(|m| m.key.namespace == namespace)
            .filter(|m| kind.is_none_or(|k| m.key.kind == k))
            .cloned()
            .collect())
    }

    fn apply(&self, manifest: &Manifest) -> ClusterResult<()> {
        if let Some(fault) = self.take_fault(&manifest.key) {
            debug!(key = %manifest.key, error = %fault, "injected apply fault");
            return Err(fault);
        }
        let mut resources = self.resources.write();
        resources.insert(manifest.key.clone(), manifest.clone());
        Ok(())
    }

    fn delete(&self, key: &ResourceKey) -> ClusterResult<()> {
        if let Some(fault) = self.take_fault(key) {
            debug!(key = %key, error = %fault, "injected delete fault");
            return Err(fault);
        }
        let mut resources = self.resources.write();
        if resources.remove(key).is_none() {
            return Err(ClusterError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

/// A manifest source serving fixed manifest sets keyed by Application name.
#[derive(Debug, Clone, Default)]
pub struct StaticManifestSource {
    sets: Arc<RwLock<HashMap<String, ResolvedManifests>>>,
    malformed: Arc<RwLock<HashMap<String, String>>>,
}

impl StaticManifestSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the manifests served for an Application.
    ///
    /// Replaces any previous set wholesale, mirroring a new revision
    /// appearing in the repository.
    pub fn set(&self, app_name: impl Into<String>, revision: impl Into<String>, manifests: Vec<Manifest>) {
        let app_name = app_name.into();
        self.malformed.write().remove(&app_name);
        let mut sets = self.sets.write();
        sets.insert(
            app_name,
            ResolvedManifests {
                revision: revision.into(),
                manifests,
            },
        );
    }

    /// Marks the Application's manifests as malformed, so fetches fail
    /// fatally until [`Self::set`] replaces them.
    pub fn set_malformed(&self, app_name: impl Into<String>, reason: impl Into<String>) {
        self.malformed.write().insert(app_name.into(), reason.into());
    }
}

impl ManifestSource for StaticManifestSource {
    fn fetch(&self, app: &Application) -> Result<ResolvedManifests, SourceError> {
        if let Some(reason) = self.malformed.read().get(&app.name) {
            return Err(SourceError::Malformed {
                revision: app.target_revision.clone(),
                reason: reason.clone(),
            });
        }
        let sets = self.sets.read();
        sets.get(&app.name)
            .cloned()
            .ok_or_else(|| SourceError::FetchFailed {
                revision: app.target_revision.clone(),
                reason: format!("no manifests registered for application '{}'", app.name),
            })
    }
}

/// A metrics provider serving fixed samples per expression.
#[derive(Debug, Clone, Default)]
pub struct StaticMetrics {
    values: Arc<RwLock<HashMap<String, f64>>>,
}

impl StaticMetrics {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value returned for an expression.
    pub fn set(&self, expression: impl Into<String>, value: f64) {
        self.values.write().insert(expression.into(), value);
    }

    /// Removes any value for an expression.
    pub fn clear(&self, expression: &str) {
        self.values.write().remove(expression);
    }
}

impl MetricsProvider for StaticMetrics {
    fn query(&self, expression: &str, _range: TimeRange) -> Vec<Sample> {
        self.values
            .read()
            .get(expression)
            .map(|&value| vec![Sample::now(value)])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(name: &str) -> Manifest {
        Manifest::new(
            ResourceKey::new("Deployment", "default", name),
            json!({"replicas": 1}),
        )
    }

    mod cluster_tests {
        use super::*;

        #[test]
        fn apply_then_list() {
            let cluster = InMemoryCluster::new();
            cluster.apply(&manifest("web")).unwrap();

            let listed = cluster.list("default", None).unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].key.name, "web");
        }

        #[test]
        fn list_filters_by_namespace_and_kind() {
            let cluster = InMemoryCluster::with_resources(vec![
                manifest("web"),
                Manifest::new(ResourceKey::new("Service", "default", "web"), json!({})),
                Manifest::new(ResourceKey::new("Deployment", "other", "api"), json!({})),
            ]);

            assert_eq!(cluster.list("default", None).unwrap().len(), 2);
            assert_eq!(
                cluster.list("default", Some("Deployment")).unwrap().len(),
                1
            );
            assert_eq!(cluster.list("other", None).unwrap().len(), 1);
        }

        #[test]
        fn delete_removes_resource() {
            let cluster = InMemoryCluster::with_resources(vec![manifest("web")]);
            let key = ResourceKey::new("Deployment", "default", "web");

            cluster.delete(&key).unwrap();
            assert!(cluster.is_empty());
        }

        #[test]
        fn delete_missing_is_not_found() {
            let cluster = InMemoryCluster::new();
            let key = ResourceKey::new("Deployment", "default", "gone");

            let result = cluster.delete(&key);
            assert!(matches!(result, Err(ClusterError::NotFound { .. })));
        }

        #[test]
        fn injected_faults_are_consumed_in_order() {
            let cluster = InMemoryCluster::new();
            let m = manifest("web");
            cluster.inject_faults(
                &m.key,
                vec![
                    ClusterError::transient("timeout"),
                    ClusterError::conflict(&m.key),
                ],
            );

            assert!(matches!(
                cluster.apply(&m),
                Err(ClusterError::Transient { .. })
            ));
            assert!(matches!(
                cluster.apply(&m),
                Err(ClusterError::Conflict { .. })
            ));
            assert!(cluster.apply(&m).is_ok());
        }

        #[test]
        fn clones_share_state() {
            let cluster = InMemoryCluster::new();
            let handle = cluster.clone();
            cluster.apply(&manifest("web")).unwrap();
            assert_eq!(handle.len(), 1);
        }
    }

    mod source_tests {
        use super::*;

        #[test]
        fn fetch_registered_set() {
            let source = StaticManifestSource::new();
            source.set("web", "abc123", vec![manifest("web")]);

            let app =
                Application::new("web", "https://git.example.com/i.git", "", "main", "default")
                    .unwrap();
            let resolved = source.fetch(&app).unwrap();
            assert_eq!(resolved.revision, "abc123");
            assert_eq!(resolved.manifests.len(), 1);
        }

        #[test]
        fn fetch_unregistered_fails() {
            let source = StaticManifestSource::new();
            let app =
                Application::new("web", "https://git.example.com/i.git", "", "main", "default")
                    .unwrap();

            let result = source.fetch(&app);
            assert!(matches!(result, Err(SourceError::FetchFailed { .. })));
        }

        #[test]
        fn set_replaces_wholesale() {
            let source = StaticManifestSource::new();
            source.set("web", "r1", vec![manifest("a"), manifest("b")]);
            source.set("web", "r2", vec![manifest("c")]);

            let app =
                Application::new("web", "https://git.example.com/i.git", "", "main", "default")
                    .unwrap();
            let resolved = source.fetch(&app).unwrap();
            assert_eq!(resolved.revision, "r2");
            assert_eq!(resolved.manifests.len(), 1);
        }

        #[test]
        fn malformed_fails_fatally_until_replaced() {
            let source = StaticManifestSource::new();
            source.set_malformed("web", "unparseable manifest");

            let app =
                Application::new("web", "https://git.example.com/i.git", "", "main", "default")
                    .unwrap();
            let err = source.fetch(&app).unwrap_err();
            assert!(err.is_fatal());

            source.set("web", "r2", vec![manifest("a")]);
            assert!(source.fetch(&app).is_ok());
        }
    }

    mod metrics_tests {
        use super::*;

        #[test]
        fn query_returns_set_value() {
            let metrics = StaticMetrics::new();
            metrics.set("error_rate", 0.25);

            let samples = metrics.query("error_rate", TimeRange::last_minutes(1));
            assert_eq!(samples.len(), 1);
            assert!((samples[0].value - 0.25).abs() < f64::EPSILON);
        }

        #[test]
        fn query_unknown_expression_is_empty() {
            let metrics = StaticMetrics::new();
            assert!(metrics
                .query("missing", TimeRange::last_minutes(1))
                .is_empty());
        }
    }
}
