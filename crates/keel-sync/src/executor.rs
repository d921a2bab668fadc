//! Batch execution of a DeltaSet against the cluster interface.

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use keel_core::{
    Application, ClusterError, ClusterInterface, DesiredState, LiveState, Manifest, ResourceKey,
};
use keel_diff::{DeltaKind, DeltaSet};

use crate::types::{ActionOutcome, SyncAction, SyncEvent, SyncOptions, SyncResult};

/// Executes sync batches against a cluster interface.
///
/// The executor is policy-driven and stateless between batches: all
/// bookkeeping lives in the returned [`SyncResult`]. Serializing batches
/// per Application is the reconciler's responsibility.
#[derive(Debug)]
pub struct SyncExecutor<C: ClusterInterface> {
    cluster: C,
    options: SyncOptions,
}

/// One action the executor has decided to take.
#[derive(Debug)]
enum PlannedAction {
    Create(Manifest),
    Update(Manifest),
    Delete(ResourceKey),
}

impl PlannedAction {
    fn key(&self) -> &ResourceKey {
        match self {
            Self::Create(m) | Self::Update(m) => &m.key,
            Self::Delete(key) => key,
        }
    }

    const fn action(&self) -> SyncAction {
        match self {
            Self::Create(_) => SyncAction::Create,
            Self::Update(_) => SyncAction::Update,
            Self::Delete(_) => SyncAction::Delete,
        }
    }
}

impl<C: ClusterInterface> SyncExecutor<C> {
    /// Creates an executor with default options.
    #[must_use]
    pub fn new(cluster: C) -> Self {
        Self::with_options(cluster, SyncOptions::default())
    }

    /// Creates an executor with custom options.
    #[must_use]
    pub const fn with_options(cluster: C, options: SyncOptions) -> Self {
        Self { cluster, options }
    }

    /// Returns the cluster interface.
    pub const fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Executes the corrective actions for a DeltaSet.
    ///
    /// Creates run first, then updates, then deletes; extras are deleted
    /// only under `prune`, otherwise reported as drift. `cancel`, when
    /// present, carries the Application's latest desired-state generation:
    /// a value newer than `desired.generation` stops the batch between
    /// resources (the in-progress action finishes).
    pub async fn sync(
        &self,
        app: &Application,
        desired: &DesiredState,
        live: &LiveState,
        delta: &DeltaSet,
        cancel: Option<&watch::Receiver<u64>>,
    ) -> SyncResult {
        let mut result = SyncResult::new(desired.revision.clone());
        let prune = app.sync_policy.prune;

        let mut planned = Vec::with_capacity(delta.len());
        for d in delta.of_kind(DeltaKind::Missing) {
            if let Some(manifest) = desired.get(&d.key) {
                planned.push(PlannedAction::Create(manifest.clone()));
            }
        }
        for d in delta.of_kind(DeltaKind::Modified) {
            if let Some(manifest) = desired.get(&d.key) {
                planned.push(PlannedAction::Update(manifest.clone()));
            }
        }
        for d in delta.of_kind(DeltaKind::Extra) {
            if prune {
                planned.push(PlannedAction::Delete(d.key.clone()));
            } else {
                debug!(app = %app.name, key = %d.key, "extra resource left as drift (prune disabled)");
                result.drift.push(d.key.clone());
            }
        }

        info!(
            app = %app.name,
            revision = %desired.revision,
            actions = planned.len(),
            drift = result.drift.len(),
            "starting sync batch"
        );

        let mut halted: Option<String> = None;
        let mut actions = planned.into_iter();
        for action in actions.by_ref() {
            if let Some(rx) = cancel {
                let latest = *rx.borrow();
                if latest > desired.generation {
                    info!(
                        app = %app.name,
                        generation = desired.generation,
                        superseded_by = latest,
                        "sync superseded by newer desired state"
                    );
                    result.cancelled = true;
                    self.skip(&mut result, &action, "superseded by newer desired state");
                    break;
                }
            }

            let (outcome, fatal) = self.run_action(app, &action, live, prune).await;
            match &outcome {
                ActionOutcome::Succeeded => match action.action() {
                    SyncAction::Delete => result.deleted += 1,
                    _ => result.applied += 1,
                },
                ActionOutcome::Failed { error, retries } => {
                    if fatal {
                        halted = Some(error.clone());
                    }
                    result.failed += 1;
                    result.health = keel_core::AppHealth::degraded(error.clone(), *retries);
                }
                ActionOutcome::Skipped { .. } => {
                    // Policy violations land here: left as drift, not failure.
                    result.drift.push(action.key().clone());
                }
            }
            result
                .events
                .push(SyncEvent::now(action.key().clone(), action.action(), outcome));

            if halted.is_some() {
                break;
            }
        }

        // Whatever remains after a cancellation or fatal halt is skipped.
        let reason = if result.cancelled {
            "superseded by newer desired state"
        } else {
            "halted by fatal configuration error"
        };
        for action in actions {
            self.skip(&mut result, &action, reason);
        }

        if result.cancelled && !result.health.is_degraded() {
            result.health = keel_core::AppHealth::Progressing;
        }

        info!(
            app = %app.name,
            applied = result.applied,
            deleted = result.deleted,
            failed = result.failed,
            skipped = result.skipped,
            cancelled = result.cancelled,
            "sync batch finished"
        );

        result
    }

    fn skip(&self, result: &mut SyncResult, action: &PlannedAction, reason: &str) {
        result.skipped += 1;
        result.events.push(SyncEvent::now(
            action.key().clone(),
            action.action(),
            ActionOutcome::Skipped {
                reason: reason.to_string(),
            },
        ));
    }

    /// Runs one action with bounded retries and exponential backoff.
    ///
    /// The second return value is true when the failure is a fatal
    /// configuration error, which halts the rest of the batch.
    async fn run_action(
        &self,
        app: &Application,
        action: &PlannedAction,
        live: &LiveState,
        prune: bool,
    ) -> (ActionOutcome, bool) {
        let key = action.key().clone();
        let mut merge_base = live.get(&key).map(|m| m.spec.clone());
        let mut retries = 0u32;

        loop {
            let attempt = match action {
                PlannedAction::Create(manifest) => self.cluster.apply(manifest),
                PlannedAction::Update(manifest) => {
                    // Server-side apply: merge over live unless prune
                    // dictates full replacement.
                    let spec = if prune {
                        manifest.spec.clone()
                    } else {
                        merge_specs(merge_base.as_ref(), &manifest.spec)
                    };
                    self.cluster.apply(&Manifest::new(key.clone(), spec))
                }
                PlannedAction::Delete(target) => self.cluster.delete(target),
            };

            let err = match attempt {
                Ok(()) => {
                    debug!(app = %app.name, key = %key, action = %action.action(), retries, "action succeeded");
                    return (ActionOutcome::Succeeded, false);
                }
                Err(err) => err,
            };

            if matches!(err, ClusterError::PolicyViolation { .. }) {
                warn!(app = %app.name, key = %key, error = %err, "action forbidden by policy, reported as drift");
                return (
                    ActionOutcome::Skipped {
                        reason: err.to_string(),
                    },
                    false,
                );
            }

            if !err.is_retryable() || retries >= self.options.retry_limit {
                warn!(
                    app = %app.name,
                    key = %key,
                    error = %err,
                    retries,
                    "action failed, no further automatic retries"
                );
                let fatal = matches!(err, ClusterError::FatalConfig { .. });
                return (
                    ActionOutcome::Failed {
                        error: err.to_string(),
                        retries,
                    },
                    fatal,
                );
            }

            if err.needs_reread() {
                merge_base = self.read_live_spec(&key);
            }

            let delay = self.options.backoff.delay(retries);
            debug!(
                app = %app.name,
                key = %key,
                error = %err,
                retry = retries + 1,
                delay_secs = delay.as_secs(),
                "retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            retries += 1;
        }
    }

    /// Re-reads the live spec for a key after a conflict.
    fn read_live_spec(&self, key: &ResourceKey) -> Option<Value> {
        match self.cluster.list(&key.namespace, Some(&key.kind)) {
            Ok(resources) => resources
                .into_iter()
                .find(|m| m.key == *key)
                .map(|m| m.spec),
            Err(err) => {
                warn!(key = %key, error = %err, "re-read after conflict failed");
                None
            }
        }
    }
}

/// Deep-merges the desired spec over a live base.
///
/// Object fields merge recursively with desired values winning; arrays
/// and scalars are replaced. Fields only the base carries survive, which
/// is what server-side apply does.
fn merge_specs(base: Option<&Value>, desired: &Value) -> Value {
    match (base, desired) {
        (Some(Value::Object(have)), Value::Object(want)) => {
            let mut merged = have.clone();
            for (k, v) in want {
                let merged_value = merge_specs(have.get(k), v);
                merged.insert(k.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => desired.clone(),
    }
}
