//! Alert evaluation.
//!
//! The evaluator owns the rule set and the per-(rule, Application) alert
//! state machines. Each evaluation pass takes the current batch of
//! [`AppStatusSnapshot`]s, checks every enabled rule against every
//! snapshot, and advances the state machines:
//!
//! Inactive -> Pending -> Firing -> Resolved -> Inactive
//!
//! A condition must hold continuously for the rule's `for` duration
//! before the alert fires. Resolved alerts are retained for a grace
//! period so they remain visible, then garbage collected.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use keel_core::{MetricsProvider, TimeRange};

use crate::error::{AlertError, Result};
use crate::types::{AlertCondition, AlertInstance, AlertRule, AlertState, AppStatusSnapshot};

/// Configuration for the alert evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// How long resolved alerts are retained before garbage collection.
    pub resolved_retention: Duration,
    /// Time window handed to the metrics provider for threshold queries.
    pub metric_window: Duration,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            resolved_retention: Duration::from_secs(300),
            metric_window: Duration::from_secs(300),
        }
    }
}

/// Result of a single evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct EvaluationOutcome {
    /// Alerts that transitioned to firing during this pass.
    pub fired: Vec<AlertInstance>,
    /// Alerts that transitioned to resolved during this pass.
    pub resolved: Vec<AlertInstance>,
}

impl EvaluationOutcome {
    /// Returns true if nothing fired or resolved.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.fired.is_empty() && self.resolved.is_empty()
    }
}

/// Evaluates alert rules against Application status snapshots.
pub struct AlertEvaluator {
    config: EvaluatorConfig,
    rules: Arc<RwLock<HashMap<String, AlertRule>>>,
    /// Live state machines keyed by alert fingerprint.
    alerts: Arc<RwLock<HashMap<String, AlertInstance>>>,
    metrics: Option<Arc<dyn MetricsProvider>>,
}

impl AlertEvaluator {
    /// Creates an evaluator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    /// Creates an evaluator with the given configuration.
    #[must_use]
    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self {
            config,
            rules: Arc::new(RwLock::new(HashMap::new())),
            alerts: Arc::new(RwLock::new(HashMap::new())),
            metrics: None,
        }
    }

    /// Attaches a metrics provider for `MetricThreshold` conditions.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Registers a rule.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if a rule with the same name is
    /// already registered.
    pub fn add_rule(&self, rule: AlertRule) -> Result<()> {
        let mut rules = self.rules.write();
        if rules.values().any(|r| r.name == rule.name) {
            return Err(AlertError::InvalidRule {
                reason: format!("a rule named '{}' is already registered", rule.name),
            });
        }
        info!(rule = %rule.name, condition = %rule.condition, "alert rule registered");
        rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    /// Removes a rule by id. Alerts already raised by the rule resolve
    /// on the next evaluation pass.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::RuleNotFound` if no rule has the given id.
    pub fn remove_rule(&self, id: &str) -> Result<AlertRule> {
        self.rules
            .write()
            .remove(id)
            .ok_or_else(|| AlertError::RuleNotFound { id: id.to_string() })
    }

    /// Returns all registered rules.
    #[must_use]
    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.read().values().cloned().collect()
    }

    /// Returns all alerts currently pending or firing.
    #[must_use]
    pub fn active_alerts(&self) -> Vec<AlertInstance> {
        self.alerts
            .read()
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    /// Returns all alerts currently in the firing state.
    #[must_use]
    pub fn firing_alerts(&self) -> Vec<AlertInstance> {
        self.alerts
            .read()
            .values()
            .filter(|a| a.state == AlertState::Firing)
            .cloned()
            .collect()
    }

    /// Runs an evaluation pass at the current wall-clock time.
    pub fn evaluate(&self, snapshots: &[AppStatusSnapshot]) -> EvaluationOutcome {
        self.evaluate_at(snapshots, Utc::now())
    }

    /// Runs an evaluation pass at an explicit time.
    pub fn evaluate_at(
        &self,
        snapshots: &[AppStatusSnapshot],
        now: DateTime<Utc>,
    ) -> EvaluationOutcome {
        let rules: Vec<AlertRule> = self
            .rules
            .read()
            .values()
            .filter(|r| r.enabled)
            .cloned()
            .collect();

        let mut outcome = EvaluationOutcome::default();
        let mut alerts = self.alerts.write();
        let mut visited = HashSet::new();

        for rule in &rules {
            for snapshot in snapshots {
                let holds = self.condition_holds(&rule.condition, snapshot, now);
                let fingerprint = Self::scope_fingerprint(rule, &snapshot.application);
                visited.insert(fingerprint.clone());

                match alerts.get_mut(&fingerprint) {
                    Some(alert) if alert.is_active() => {
                        if holds {
                            alert.touch(now);
                            if alert.state == AlertState::Pending
                                && now >= alert.first_seen + to_chrono(rule.for_duration())
                            {
                                alert.fire(now);
                                info!(
                                    rule = %rule.name,
                                    application = %snapshot.application,
                                    severity = %rule.severity,
                                    "alert firing"
                                );
                                outcome.fired.push(alert.clone());
                            }
                        } else {
                            let was_firing = alert.state == AlertState::Firing;
                            alert.resolve(now);
                            if was_firing {
                                info!(
                                    rule = %rule.name,
                                    application = %snapshot.application,
                                    "alert resolved"
                                );
                                outcome.resolved.push(alert.clone());
                            } else {
                                debug!(
                                    rule = %rule.name,
                                    application = %snapshot.application,
                                    "pending alert cleared before firing"
                                );
                            }
                        }
                    }
                    _ => {
                        // Inactive (or only a resolved remnant). A holding
                        // condition starts a fresh state machine; with a
                        // zero debounce it fires in the same pass.
                        if holds {
                            let mut alert =
                                AlertInstance::new_pending(rule, &snapshot.application, now);
                            if rule.for_duration_secs == 0 {
                                alert.fire(now);
                                info!(
                                    rule = %rule.name,
                                    application = %snapshot.application,
                                    severity = %rule.severity,
                                    "alert firing"
                                );
                                outcome.fired.push(alert.clone());
                            }
                            alerts.insert(fingerprint, alert);
                        }
                    }
                }
            }
        }

        // An active alert whose scope produced no snapshot this pass has
        // lost its subject (the Application was removed, or its rule was
        // removed or disabled). Resolve it so it stops firing and becomes
        // eligible for garbage collection.
        for (fingerprint, alert) in alerts.iter_mut() {
            if alert.is_active() && !visited.contains(fingerprint) {
                let was_firing = alert.state == AlertState::Firing;
                alert.resolve(now);
                if was_firing {
                    info!(
                        rule = %alert.rule_name,
                        application = %alert.application,
                        "alert resolved, scope no longer evaluated"
                    );
                    outcome.resolved.push(alert.clone());
                }
            }
        }

        Self::gc_resolved(&mut alerts, self.config.resolved_retention, now);
        outcome
    }

    /// Drops resolved alerts older than the retention window.
    fn gc_resolved(
        alerts: &mut HashMap<String, AlertInstance>,
        retention: Duration,
        now: DateTime<Utc>,
    ) {
        alerts.retain(|_, alert| match alert.resolved_at {
            Some(at) if alert.state == AlertState::Resolved => now < at + to_chrono(retention),
            _ => true,
        });
    }

    fn condition_holds(
        &self,
        condition: &AlertCondition,
        snapshot: &AppStatusSnapshot,
        now: DateTime<Utc>,
    ) -> bool {
        match condition {
            AlertCondition::SyncStatusIs(status) => snapshot.sync_status == *status,
            AlertCondition::Degraded => snapshot.health.is_degraded(),
            AlertCondition::DriftDetected => snapshot.drift_count > 0,
            AlertCondition::MetricThreshold {
                expression,
                operator,
                threshold,
            } => {
                let Some(metrics) = &self.metrics else {
                    return false;
                };
                let window = to_chrono(self.config.metric_window);
                let range = TimeRange {
                    start: now - window,
                    end: now,
                };
                let samples = metrics.query(expression, range);
                samples
                    .last()
                    .is_some_and(|s| operator.evaluate(s.value, *threshold))
            }
        }
    }

    /// The stable key identifying a (rule, Application) state machine.
    fn scope_fingerprint(rule: &AlertRule, application: &str) -> String {
        let mut labels = rule.labels.clone();
        labels.insert("alertname".to_string(), rule.name.clone());
        labels.insert("severity".to_string(), rule.severity.as_str().to_string());
        labels.insert("application".to_string(), application.to_string());
        AlertInstance::compute_fingerprint(&rule.id, application, &labels)
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::MAX)
}
