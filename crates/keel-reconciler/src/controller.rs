//! The reconciliation control loop.
//!
//! One [`Reconciler`] owns a set of Applications and drives each through
//! the fetch -> list -> diff -> sync cycle. Concurrency model:
//!
//! - Applications reconcile concurrently and independently; there is no
//!   global lock.
//! - A `tokio::sync::Mutex` per Application guarantees at most one
//!   in-flight sync; a poll never overlaps a running sync for the same
//!   Application.
//! - Each new desired-state snapshot gets a monotonically increasing
//!   generation, published on a `watch` channel the executor observes
//!   mid-batch. Bumping the generation (new snapshot, policy change,
//!   removal) supersedes the in-flight batch: latest wins, the
//!   in-progress action finishes.
//!
//! Live state is read fresh at the start of every cycle and never cached
//! across cycles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use keel_alerts::{AlertEvaluator, NotificationRouter};
use keel_core::{
    AppHealth, Application, ClusterInterface, DesiredState, LiveState, ManifestSource, SyncPolicy,
};
use keel_diff::{diff, DeltaKind, DeltaSet};
use keel_sync::SyncExecutor;

use crate::config::ReconcilerConfig;
use crate::error::{ReconcilerError, Result};
use crate::status::{AppStatus, StatusStore};

/// Per-Application bookkeeping.
struct AppEntry {
    app: RwLock<Application>,
    /// Counter behind the generation channel. Incremented for every new
    /// desired-state snapshot and for supersede events.
    generation: AtomicU64,
    gen_tx: watch::Sender<u64>,
    /// Single-flight guard: at most one cycle in flight per Application.
    sync_lock: Mutex<()>,
    /// Set by a manual trigger; consumed by the next cycle.
    force_sync: AtomicBool,
}

impl AppEntry {
    fn new(app: Application) -> Self {
        let (gen_tx, _) = watch::channel(0);
        Self {
            app: RwLock::new(app),
            generation: AtomicU64::new(0),
            gen_tx,
            sync_lock: Mutex::new(()),
            force_sync: AtomicBool::new(false),
        }
    }

    /// Advances the generation and publishes it.
    fn bump_generation(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.gen_tx.send(generation);
        generation
    }
}

/// Drives Applications toward their desired state.
pub struct Reconciler<S, C>
where
    S: ManifestSource + 'static,
    C: ClusterInterface + Clone + 'static,
{
    config: ReconcilerConfig,
    source: Arc<S>,
    cluster: C,
    status: StatusStore,
    apps: Arc<RwLock<HashMap<String, Arc<AppEntry>>>>,
    evaluator: Option<Arc<AlertEvaluator>>,
    router: Option<Arc<NotificationRouter>>,
    shutdown_tx: watch::Sender<bool>,
}

impl<S, C> Reconciler<S, C>
where
    S: ManifestSource + 'static,
    C: ClusterInterface + Clone + 'static,
{
    /// Creates a reconciler over a manifest source and cluster interface.
    #[must_use]
    pub fn new(source: S, cluster: C, config: ReconcilerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            source: Arc::new(source),
            cluster,
            status: StatusStore::new(),
            apps: Arc::new(RwLock::new(HashMap::new())),
            evaluator: None,
            router: None,
            shutdown_tx,
        }
    }

    /// Attaches alert evaluation and notification routing to the loop.
    #[must_use]
    pub fn with_alerting(
        mut self,
        evaluator: Arc<AlertEvaluator>,
        router: NotificationRouter,
    ) -> Self {
        self.evaluator = Some(evaluator);
        self.router = Some(Arc::new(router));
        self
    }

    /// Returns a handle to the status store.
    #[must_use]
    pub fn status(&self) -> StatusStore {
        self.status.clone()
    }

    /// Registers an Application.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::DuplicateApplication` if the name is
    /// already registered.
    pub fn add_application(&self, app: Application) -> Result<()> {
        let mut apps = self.apps.write();
        if apps.contains_key(&app.name) {
            return Err(ReconcilerError::DuplicateApplication {
                name: app.name.clone(),
            });
        }
        info!(
            app = %app.name,
            repo = %app.repo_url,
            namespace = %app.destination_namespace,
            self_heal = app.sync_policy.self_heal,
            prune = app.sync_policy.prune,
            "application registered"
        );
        self.status.update(&app.name, |_| {});
        apps.insert(app.name.clone(), Arc::new(AppEntry::new(app)));
        Ok(())
    }

    /// Unregisters an Application. An in-flight sync is superseded and
    /// stops between resources.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::UnknownApplication` if the name is not
    /// registered.
    pub fn remove_application(&self, name: &str) -> Result<Application> {
        let entry = self
            .apps
            .write()
            .remove(name)
            .ok_or_else(|| ReconcilerError::UnknownApplication {
                name: name.to_string(),
            })?;
        entry.bump_generation();
        self.status.remove(name);
        info!(app = %name, "application removed");
        Ok(entry.app.read().clone())
    }

    /// Replaces an Application's sync policy. An in-flight sync is
    /// superseded so the next cycle runs under the new policy.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::UnknownApplication` if the name is not
    /// registered.
    pub fn set_policy(&self, name: &str, policy: SyncPolicy) -> Result<()> {
        let entry = self.entry(name)?;
        entry.app.write().sync_policy = policy;
        entry.bump_generation();
        info!(
            app = %name,
            self_heal = policy.self_heal,
            prune = policy.prune,
            "sync policy updated"
        );
        Ok(())
    }

    /// Returns the registered Application names, sorted.
    #[must_use]
    pub fn application_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.apps.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the current desired-state generation for an Application.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::UnknownApplication` if the name is not
    /// registered.
    pub fn generation(&self, name: &str) -> Result<u64> {
        Ok(self.entry(name)?.generation.load(Ordering::SeqCst))
    }

    /// Runs one immediate cycle with syncing forced, regardless of the
    /// `self_heal` policy. This is the manual trigger for Applications
    /// that do not self-heal.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::UnknownApplication` if the name is not
    /// registered.
    pub async fn trigger_sync(&self, name: &str) -> Result<AppStatus> {
        let entry = self.entry(name)?;
        entry.force_sync.store(true, Ordering::SeqCst);
        self.reconcile(name).await
    }

    /// Runs one reconciliation cycle for an Application:
    /// fetch -> list -> diff -> (maybe) sync, then status update.
    ///
    /// Serialized per Application; a concurrent call for the same name
    /// waits for the in-flight cycle to finish.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::UnknownApplication` if the name is not
    /// registered. Source and cluster failures are recorded in the
    /// status store, not returned.
    pub async fn reconcile(&self, name: &str) -> Result<AppStatus> {
        let entry = self.entry(name)?;
        let _guard = entry.sync_lock.lock().await;

        let app = entry.app.read().clone();
        let force = entry.force_sync.swap(false, Ordering::SeqCst);
        let previous = self.status.get(name).unwrap_or_default();

        let resolved = match self.source.fetch(&app) {
            Ok(resolved) => resolved,
            Err(err) => {
                let fatal = err.is_fatal();
                warn!(app = %name, error = %err, fatal, "manifest fetch failed");
                self.status.update(name, |s| {
                    s.last_error = Some(err.to_string());
                    s.last_reconciled_at = Some(Utc::now());
                    if fatal {
                        // Malformed manifests halt the Application until
                        // the source is corrected.
                        s.health = AppHealth::degraded(err.to_string(), 0);
                    }
                });
                return self.current_status(name);
            }
        };

        let generation = entry.bump_generation();
        let desired = DesiredState::new(resolved.revision, generation, resolved.manifests);

        let live = match self.cluster.list(&app.destination_namespace, None) {
            Ok(resources) => LiveState::new(resources),
            Err(err) => {
                warn!(app = %name, error = %err, "live state read failed");
                self.status.update(name, |s| {
                    s.last_error = Some(err.to_string());
                    s.last_reconciled_at = Some(Utc::now());
                });
                return self.current_status(name);
            }
        };

        let delta = diff(&desired, &live);
        let should_sync = !delta.is_empty() && (app.sync_policy.self_heal || force);

        if should_sync {
            self.sync_and_record(&entry, &app, &desired, &live, &delta)
                .await;
        } else {
            self.record_observation(&app, &delta);
        }

        let status = self.current_status(name)?;
        if status.sync_status != previous.sync_status {
            info!(
                app = %name,
                from = %previous.sync_status,
                to = %status.sync_status,
                "sync status transition"
            );
        }
        Ok(status)
    }

    /// Runs one sync batch and records its outcome.
    async fn sync_and_record(
        &self,
        entry: &AppEntry,
        app: &Application,
        desired: &DesiredState,
        live: &LiveState,
        delta: &DeltaSet,
    ) {
        let executor =
            SyncExecutor::with_options(self.cluster.clone(), self.config.sync_options);
        let cancel = entry.gen_tx.subscribe();
        let result = executor.sync(app, desired, live, delta, Some(&cancel)).await;

        // Re-read after the batch so the recorded status reflects the
        // cluster as it is, not as the batch intended it.
        let sync_status = match self.cluster.list(&app.destination_namespace, None) {
            Ok(resources) => diff(desired, &LiveState::new(resources)).sync_status(),
            Err(err) => {
                debug!(app = %app.name, error = %err, "post-sync read failed");
                keel_core::SyncStatus::Unknown
            }
        };

        self.status.update(&app.name, |s| {
            s.sync_status = sync_status;
            s.health = result.health.clone();
            s.drift = result.drift.clone();
            s.last_reconciled_at = Some(Utc::now());
            s.last_error = if result.failed > 0 {
                Some(format!(
                    "{} resource(s) failed to sync toward {}",
                    result.failed, result.revision
                ))
            } else {
                None
            };
            if result.is_success() && result.failed == 0 {
                s.last_synced_revision = Some(result.revision.clone());
            }
            s.last_sync_events = result.events.clone();
        });
    }

    /// Records the observed state for a cycle that did not sync.
    fn record_observation(&self, app: &Application, delta: &DeltaSet) {
        let drift: Vec<_> = if app.sync_policy.prune {
            Vec::new()
        } else {
            delta
                .of_kind(DeltaKind::Extra)
                .map(|d| d.key.clone())
                .collect()
        };

        self.status.update(&app.name, |s| {
            s.sync_status = delta.sync_status();
            s.drift = drift;
            s.last_error = None;
            s.last_reconciled_at = Some(Utc::now());
            if delta.is_empty() {
                s.health = AppHealth::Healthy;
            }
        });
    }

    /// Evaluates alert rules against the status store and routes any
    /// fired or resolved alerts. A no-op unless alerting is attached.
    pub async fn evaluate_alerts(&self) {
        let (Some(evaluator), Some(router)) = (&self.evaluator, &self.router) else {
            return;
        };

        let outcome = evaluator.evaluate(&self.status.snapshots());
        if outcome.is_quiet() {
            return;
        }

        let firing = evaluator.firing_alerts();
        for alert in outcome.fired.iter().chain(outcome.resolved.iter()) {
            let summary = router.route(alert, &firing).await;
            if summary.inhibited {
                debug!(
                    rule = %alert.rule_name,
                    application = %alert.application,
                    "alert delivery inhibited"
                );
            } else {
                debug!(
                    rule = %alert.rule_name,
                    application = %alert.application,
                    attempts = summary.attempts.len(),
                    delivered = summary.all_delivered(),
                    "alert routed"
                );
            }
        }
    }

    /// Signals the control loop to stop after the current cycles finish.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Runs the control loop until [`Reconciler::shutdown`] is called.
    ///
    /// Spawns one polling task per Application registered at call time,
    /// plus an alert evaluation task when alerting is attached.
    /// Applications registered afterwards are reconciled only via
    /// [`Reconciler::trigger_sync`] until the loop is restarted.
    pub async fn run(self: Arc<Self>) {
        let mut tasks = Vec::new();

        for name in self.application_names() {
            let this = Arc::clone(&self);
            let mut shutdown = self.shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(this.config.poll_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            match this.reconcile(&name).await {
                                Ok(status) => {
                                    debug!(
                                        app = %name,
                                        sync_status = %status.sync_status,
                                        health = %status.health,
                                        "cycle complete"
                                    );
                                }
                                Err(ReconcilerError::UnknownApplication { .. }) => break,
                                Err(err) => warn!(app = %name, error = %err, "cycle failed"),
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        if self.evaluator.is_some() {
            let this = Arc::clone(&self);
            let mut shutdown = self.shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(this.config.alert_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => this.evaluate_alerts().await,
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        join_all(tasks).await;
        info!("reconciler stopped");
    }

    fn entry(&self, name: &str) -> Result<Arc<AppEntry>> {
        self.apps
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ReconcilerError::UnknownApplication {
                name: name.to_string(),
            })
    }

    fn current_status(&self, name: &str) -> Result<AppStatus> {
        self.status
            .get(name)
            .ok_or_else(|| ReconcilerError::UnknownApplication {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::memory::{InMemoryCluster, StaticManifestSource};
    use keel_core::{ClusterError, Manifest, ResourceKey, SyncStatus};
    use serde_json::json;

    fn manifest(kind: &str, name: &str, spec: serde_json::Value) -> Manifest {
        Manifest::new(ResourceKey::new(kind, "default", name), spec)
    }

    fn app(name: &str, policy: SyncPolicy) -> Application {
        Application::new(name, "https://git.example.com/deploy.git", "apps", "main", "default")
            .unwrap()
            .with_policy(policy)
    }

    fn reconciler(
        source: StaticManifestSource,
        cluster: InMemoryCluster,
    ) -> Reconciler<StaticManifestSource, InMemoryCluster> {
        Reconciler::new(source, cluster, ReconcilerConfig::immediate())
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn duplicate_application_rejected() {
            let r = reconciler(StaticManifestSource::new(), InMemoryCluster::new());
            r.add_application(app("web", SyncPolicy::automated())).unwrap();
            let err = r
                .add_application(app("web", SyncPolicy::manual()))
                .unwrap_err();
            assert!(matches!(err, ReconcilerError::DuplicateApplication { .. }));
        }

        #[test]
        fn remove_returns_application() {
            let r = reconciler(StaticManifestSource::new(), InMemoryCluster::new());
            r.add_application(app("web", SyncPolicy::automated())).unwrap();

            let removed = r.remove_application("web").unwrap();
            assert_eq!(removed.name, "web");
            assert!(r.application_names().is_empty());
            assert!(r.status().get("web").is_none());
        }

        #[tokio::test]
        async fn unknown_application_errors() {
            let r = reconciler(StaticManifestSource::new(), InMemoryCluster::new());
            let err = r.reconcile("ghost").await.unwrap_err();
            assert!(matches!(err, ReconcilerError::UnknownApplication { .. }));
        }
    }

    mod cycle_tests {
        use super::*;

        #[tokio::test]
        async fn self_heal_converges() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );
            let cluster = InMemoryCluster::new();

            let r = reconciler(source, cluster.clone());
            r.add_application(app("web", SyncPolicy::automated())).unwrap();

            let status = r.reconcile("web").await.unwrap();
            assert_eq!(status.sync_status, SyncStatus::Synced);
            assert_eq!(status.health, AppHealth::Healthy);
            assert_eq!(status.last_synced_revision.as_deref(), Some("rev-1"));
            assert_eq!(cluster.len(), 1);
        }

        #[tokio::test]
        async fn manual_policy_observes_without_syncing() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );
            let cluster = InMemoryCluster::new();

            let r = reconciler(source, cluster.clone());
            r.add_application(app("web", SyncPolicy::manual())).unwrap();

            let status = r.reconcile("web").await.unwrap();
            assert_eq!(status.sync_status, SyncStatus::OutOfSync);
            assert!(cluster.is_empty(), "manual policy must not apply anything");
        }

        #[tokio::test]
        async fn trigger_sync_forces_manual_application() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );
            let cluster = InMemoryCluster::new();

            let r = reconciler(source, cluster.clone());
            r.add_application(app("web", SyncPolicy::manual())).unwrap();

            let status = r.trigger_sync("web").await.unwrap();
            assert_eq!(status.sync_status, SyncStatus::Synced);
            assert_eq!(cluster.len(), 1);

            // The force flag is one-shot: drift afterwards is observed
            // but not corrected.
            cluster
                .apply(&manifest("ConfigMap", "stray", json!({"data": {}})))
                .unwrap();
            let status = r.reconcile("web").await.unwrap();
            assert_eq!(status.sync_status, SyncStatus::OutOfSync);
            assert_eq!(status.drift.len(), 1);
        }

        #[tokio::test]
        async fn unpruned_drift_reported_not_degraded() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );
            let cluster = InMemoryCluster::with_resources(vec![manifest(
                "ConfigMap",
                "legacy",
                json!({"data": {"keep": "true"}}),
            )]);

            let r = reconciler(source, cluster.clone());
            let policy = SyncPolicy {
                prune: false,
                self_heal: true,
            };
            r.add_application(app("web", policy)).unwrap();

            let status = r.reconcile("web").await.unwrap();
            assert_eq!(status.drift.len(), 1);
            assert_eq!(status.health, AppHealth::Healthy);
            assert_eq!(cluster.len(), 2, "legacy configmap must survive");
        }

        #[tokio::test]
        async fn fetch_failure_is_transient() {
            let source = StaticManifestSource::new();
            // No manifest set registered: fetch fails as FetchFailed.
            let r = reconciler(source, InMemoryCluster::new());
            r.add_application(app("web", SyncPolicy::automated())).unwrap();

            let status = r.reconcile("web").await.unwrap();
            assert!(status.last_error.is_some());
            assert_eq!(status.health, AppHealth::Healthy);
            assert_eq!(status.sync_status, SyncStatus::Unknown);
        }

        #[tokio::test]
        async fn malformed_source_degrades_application() {
            let source = StaticManifestSource::new();
            source.set_malformed("web", "manifest is not valid JSON");

            let r = reconciler(source, InMemoryCluster::new());
            r.add_application(app("web", SyncPolicy::automated())).unwrap();

            let status = r.reconcile("web").await.unwrap();
            assert!(status.health.is_degraded());
            assert!(status.last_error.is_some());
        }

        #[tokio::test]
        async fn exhausted_retries_surface_as_degraded() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );
            let cluster = InMemoryCluster::new();
            let key = ResourceKey::new("Deployment", "default", "web");
            cluster.inject_faults(
                &key,
                vec![
                    ClusterError::transient("api timeout"),
                    ClusterError::transient("api timeout"),
                    ClusterError::transient("api timeout"),
                    ClusterError::transient("api timeout"),
                ],
            );

            let r = reconciler(source, cluster);
            r.add_application(app("web", SyncPolicy::automated())).unwrap();

            let status = r.reconcile("web").await.unwrap();
            assert!(status.health.is_degraded());
            assert!(status.last_error.is_some());
            assert!(status.last_synced_revision.is_none());
        }

        #[tokio::test]
        async fn sync_events_recorded_in_status() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );

            let r = reconciler(source, InMemoryCluster::new());
            r.add_application(app("web", SyncPolicy::automated())).unwrap();

            let status = r.reconcile("web").await.unwrap();
            assert_eq!(status.last_sync_events.len(), 1);
            let event = &status.last_sync_events[0];
            assert_eq!(event.key, ResourceKey::new("Deployment", "default", "web"));
            assert_eq!(event.action, keel_sync::SyncAction::Create);
            assert!(event.outcome.is_success());

            // A cycle that does not sync leaves the last batch's events
            // in place.
            let status = r.reconcile("web").await.unwrap();
            assert_eq!(status.last_sync_events.len(), 1);
        }

        #[tokio::test]
        async fn generation_increases_per_cycle() {
            let source = StaticManifestSource::new();
            source.set("web", "rev-1", vec![]);

            let r = reconciler(source, InMemoryCluster::new());
            r.add_application(app("web", SyncPolicy::automated())).unwrap();
            assert_eq!(r.generation("web").unwrap(), 0);

            r.reconcile("web").await.unwrap();
            assert_eq!(r.generation("web").unwrap(), 1);

            r.reconcile("web").await.unwrap();
            assert_eq!(r.generation("web").unwrap(), 2);
        }

        #[tokio::test]
        async fn policy_change_bumps_generation() {
            let source = StaticManifestSource::new();
            source.set("web", "rev-1", vec![]);

            let r = reconciler(source, InMemoryCluster::new());
            r.add_application(app("web", SyncPolicy::manual())).unwrap();

            r.set_policy("web", SyncPolicy::automated()).unwrap();
            assert_eq!(r.generation("web").unwrap(), 1);

            let entry = r.entry("web").unwrap();
            assert!(entry.app.read().sync_policy.self_heal);
        }

        #[tokio::test]
        async fn empty_delta_is_healthy_without_sync() {
            let desired = manifest("Deployment", "web", json!({"replicas": 3}));
            let source = StaticManifestSource::new();
            source.set("web", "rev-1", vec![desired.clone()]);
            let cluster = InMemoryCluster::with_resources(vec![desired]);

            let r = reconciler(source, cluster);
            r.add_application(app("web", SyncPolicy::manual())).unwrap();

            let status = r.reconcile("web").await.unwrap();
            assert_eq!(status.sync_status, SyncStatus::Synced);
            assert_eq!(status.health, AppHealth::Healthy);
        }
    }

    mod loop_tests {
        use super::*;
        use std::time::Duration;

        #[tokio::test(start_paused = true)]
        async fn run_polls_until_shutdown() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );
            let cluster = InMemoryCluster::new();

            let r = Arc::new(
                Reconciler::new(
                    source,
                    cluster.clone(),
                    ReconcilerConfig::immediate().with_poll_interval(Duration::from_secs(30)),
                )
            );
            r.add_application(app("web", SyncPolicy::automated())).unwrap();

            let handle = tokio::spawn(Arc::clone(&r).run());

            // First tick fires immediately; the loop converges.
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(cluster.len(), 1);
            assert_eq!(
                r.status().get("web").unwrap().sync_status,
                SyncStatus::Synced
            );

            // Drift introduced between polls is healed on the next tick.
            cluster
                .apply(&manifest("Deployment", "web", json!({"replicas": 1})))
                .unwrap();
            tokio::time::sleep(Duration::from_secs(31)).await;
            let healed = cluster
                .get(&ResourceKey::new("Deployment", "default", "web"))
                .unwrap();
            assert_eq!(healed.spec["replicas"], 3);

            r.shutdown();
            handle.await.unwrap();
        }

        #[tokio::test]
        async fn applications_reconcile_independently() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );
            // "api" has no manifests registered, so its fetch fails.
            let cluster = InMemoryCluster::new();

            let r = reconciler(source, cluster);
            r.add_application(app("web", SyncPolicy::automated())).unwrap();
            r.add_application(app("api", SyncPolicy::automated())).unwrap();

            let (web, api) = tokio::join!(r.reconcile("web"), r.reconcile("api"));
            assert_eq!(web.unwrap().sync_status, SyncStatus::Synced);
            assert!(api.unwrap().last_error.is_some());
        }
    }

    mod alerting_tests {
        use super::*;
        use keel_alerts::{
            AlertCondition, AlertRule, AlertSeverity, LogChannel, RouterConfig,
        };

        #[tokio::test]
        async fn out_of_sync_fires_alert() {
            let source = StaticManifestSource::new();
            source.set(
                "web",
                "rev-1",
                vec![manifest("Deployment", "web", json!({"replicas": 3}))],
            );

            let evaluator = Arc::new(AlertEvaluator::new());
            evaluator
                .add_rule(
                    AlertRule::builder(
                        "AppOutOfSync",
                        AlertCondition::SyncStatusIs(SyncStatus::OutOfSync),
                    )
                    .severity(AlertSeverity::Warning)
                    .build()
                    .unwrap(),
                )
                .unwrap();
            let mut router = NotificationRouter::with_config(RouterConfig::immediate());
            router.add_channel(Arc::new(LogChannel::default()));

            let r = reconciler(source, InMemoryCluster::new())
                .with_alerting(Arc::clone(&evaluator), router);
            r.add_application(app("web", SyncPolicy::manual())).unwrap();

            r.reconcile("web").await.unwrap();
            r.evaluate_alerts().await;

            let firing = evaluator.firing_alerts();
            assert_eq!(firing.len(), 1);
            assert_eq!(firing[0].application, "web");

            // Syncing resolves the alert on the next evaluation.
            r.trigger_sync("web").await.unwrap();
            r.evaluate_alerts().await;
            assert!(evaluator.firing_alerts().is_empty());
        }
    }
}
