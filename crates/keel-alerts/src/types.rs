//! Core alerting types.
//!
//! - [`AlertSeverity`]: priority class of an alert
//! - [`AlertState`]: position in the per-(Application, rule) state machine
//! - [`AlertCondition`]: what a rule watches
//! - [`AlertRule`]: condition plus debounce, severity, and labels
//! - [`AlertInstance`]: one live alert for one Application
//! - [`AppStatusSnapshot`]: the reconciler-side input to evaluation

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keel_core::{AppHealth, SyncStatus};

use crate::error::{AlertError, Result};

/// The severity class of an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational, no action required.
    Info,
    /// Should be investigated.
    #[default]
    Warning,
    /// Requires immediate attention.
    Critical,
}

impl AlertSeverity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Returns the priority of this severity (higher = more urgent).
    ///
    /// Inhibition compares priorities: a firing higher-priority alert
    /// suppresses delivery of lower-priority ones in the same scope.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Info => 1,
            Self::Warning => 2,
            Self::Critical => 3,
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position of an alert in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// The condition held for the first time but not yet long enough.
    Pending,
    /// The condition held for the full `for` duration.
    Firing,
    /// The condition stopped holding; retained for a grace period.
    Resolved,
}

impl AlertState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }

    /// Returns true if the alert is pending or firing.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Firing)
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison operators for metric threshold conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// Greater than (>).
    #[serde(rename = ">")]
    GreaterThan,
    /// Greater than or equal (>=).
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// Less than (<).
    #[serde(rename = "<")]
    LessThan,
    /// Less than or equal (<=).
    #[serde(rename = "<=")]
    LessThanOrEqual,
}

impl ComparisonOperator {
    /// Evaluates the comparison between a value and a threshold.
    #[must_use]
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::GreaterThanOrEqual => value >= threshold,
            Self::LessThan => value < threshold,
            Self::LessThanOrEqual => value <= threshold,
        }
    }

    /// Returns the operator as a symbol.
    #[must_use]
    pub const fn as_symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_symbol())
    }
}

/// What an alert rule watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "condition", content = "params")]
pub enum AlertCondition {
    /// The Application's computed sync status equals the given status.
    SyncStatusIs(SyncStatus),
    /// The Application's health is Degraded.
    Degraded,
    /// The Application reports unpruned drift.
    DriftDetected,
    /// A time-series query crosses a threshold.
    MetricThreshold {
        /// The query expression handed to the metrics provider.
        expression: String,
        /// Comparison operator.
        operator: ComparisonOperator,
        /// Threshold value.
        threshold: f64,
    },
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SyncStatusIs(status) => write!(f, "sync_status == {status}"),
            Self::Degraded => write!(f, "health == degraded"),
            Self::DriftDetected => write!(f, "drift > 0"),
            Self::MetricThreshold {
                expression,
                operator,
                threshold,
            } => write!(f, "{expression} {operator} {threshold}"),
        }
    }
}

/// A rule that defines when and how to alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique identifier for the rule.
    pub id: String,
    /// Human-readable name for the rule.
    pub name: String,
    /// The condition this rule watches.
    pub condition: AlertCondition,
    /// How long the condition must hold before firing (in seconds).
    pub for_duration_secs: u64,
    /// The severity of alerts generated by this rule.
    pub severity: AlertSeverity,
    /// Labels attached to alerts generated by this rule.
    pub labels: HashMap<String, String>,
    /// Annotations providing more context.
    pub annotations: HashMap<String, String>,
    /// Whether this rule is evaluated.
    pub enabled: bool,
}

impl AlertRule {
    /// Maximum allowed length for rule names.
    pub const MAX_NAME_LENGTH: usize = 256;

    /// Creates a new rule builder.
    pub fn builder(name: impl Into<String>, condition: AlertCondition) -> AlertRuleBuilder {
        AlertRuleBuilder::new(name, condition)
    }

    /// Returns the debounce window as a [`Duration`].
    #[must_use]
    pub const fn for_duration(&self) -> Duration {
        Duration::from_secs(self.for_duration_secs)
    }
}

/// Builder for [`AlertRule`] instances.
#[derive(Debug)]
pub struct AlertRuleBuilder {
    name: String,
    condition: AlertCondition,
    for_duration_secs: u64,
    severity: AlertSeverity,
    labels: HashMap<String, String>,
    annotations: HashMap<String, String>,
    enabled: bool,
}

impl AlertRuleBuilder {
    fn new(name: impl Into<String>, condition: AlertCondition) -> Self {
        Self {
            name: name.into(),
            condition,
            for_duration_secs: 0,
            severity: AlertSeverity::Warning,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            enabled: true,
        }
    }

    /// Sets the duration the condition must hold before firing.
    #[must_use]
    pub const fn for_duration(mut self, duration: Duration) -> Self {
        self.for_duration_secs = duration.as_secs();
        self
    }

    /// Sets the debounce window in seconds.
    #[must_use]
    pub const fn for_duration_secs(mut self, secs: u64) -> Self {
        self.for_duration_secs = secs;
        self
    }

    /// Sets the severity.
    #[must_use]
    pub const fn severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Sets whether the rule is evaluated.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builds the rule.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if the name is empty or exceeds
    /// [`AlertRule::MAX_NAME_LENGTH`].
    pub fn build(self) -> Result<AlertRule> {
        if self.name.is_empty() {
            return Err(AlertError::InvalidRule {
                reason: "rule name cannot be empty".to_string(),
            });
        }
        if self.name.len() > AlertRule::MAX_NAME_LENGTH {
            return Err(AlertError::InvalidRule {
                reason: format!(
                    "rule name exceeds maximum length of {} characters",
                    AlertRule::MAX_NAME_LENGTH
                ),
            });
        }

        Ok(AlertRule {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            condition: self.condition,
            for_duration_secs: self.for_duration_secs,
            severity: self.severity,
            labels: self.labels,
            annotations: self.annotations,
            enabled: self.enabled,
        })
    }
}

/// Per-Application status the reconciler feeds into evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStatusSnapshot {
    /// The Application's name.
    pub application: String,
    /// Computed sync status at snapshot time.
    pub sync_status: SyncStatus,
    /// Health at snapshot time.
    pub health: AppHealth,
    /// How many live resources are drift (extras without prune).
    pub drift_count: usize,
}

impl AppStatusSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(
        application: impl Into<String>,
        sync_status: SyncStatus,
        health: AppHealth,
        drift_count: usize,
    ) -> Self {
        Self {
            application: application.into(),
            sync_status,
            health,
            drift_count,
        }
    }
}

/// One live alert for one (Application, rule) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertInstance {
    /// Unique id of this instance.
    pub id: String,
    /// The rule that generated the alert.
    pub rule_id: String,
    /// The rule's human-readable name.
    pub rule_name: String,
    /// The Application the alert is scoped to.
    pub application: String,
    /// Current lifecycle state.
    pub state: AlertState,
    /// Severity class.
    pub severity: AlertSeverity,
    /// When the condition first held.
    pub first_seen: DateTime<Utc>,
    /// When the condition last held.
    pub last_seen: DateTime<Utc>,
    /// When the alert fired (None while pending).
    pub fired_at: Option<DateTime<Utc>>,
    /// When the alert resolved (None while active).
    pub resolved_at: Option<DateTime<Utc>>,
    /// Labels attached to the alert.
    pub labels: HashMap<String, String>,
    /// Annotations providing more context.
    pub annotations: HashMap<String, String>,
    /// Fingerprint for deduplication (hash of rule + application + labels).
    pub fingerprint: String,
}

impl AlertInstance {
    /// Creates a new pending alert from a rule, for an Application.
    #[must_use]
    pub fn new_pending(rule: &AlertRule, application: &str, now: DateTime<Utc>) -> Self {
        let mut labels = rule.labels.clone();
        labels.insert("alertname".to_string(), rule.name.clone());
        labels.insert("severity".to_string(), rule.severity.as_str().to_string());
        labels.insert("application".to_string(), application.to_string());

        let fingerprint = Self::compute_fingerprint(&rule.id, application, &labels);

        Self {
            id: Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            application: application.to_string(),
            state: AlertState::Pending,
            severity: rule.severity,
            first_seen: now,
            last_seen: now,
            fired_at: None,
            resolved_at: None,
            labels,
            annotations: rule.annotations.clone(),
            fingerprint,
        }
    }

    /// Transitions the alert to the firing state.
    pub fn fire(&mut self, now: DateTime<Utc>) {
        if self.state == AlertState::Pending {
            self.state = AlertState::Firing;
            self.fired_at = Some(now);
        }
    }

    /// Transitions the alert to the resolved state.
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        if self.state != AlertState::Resolved {
            self.state = AlertState::Resolved;
            self.resolved_at = Some(now);
        }
    }

    /// Records that the condition still held at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
    }

    /// Returns true if the alert is pending or firing.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Computes the deduplication fingerprint for a (rule, Application)
    /// scope.
    #[must_use]
    pub fn compute_fingerprint(
        rule_id: &str,
        application: &str,
        labels: &HashMap<String, String>,
    ) -> String {
        use std::hash::{Hash, Hasher};

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        rule_id.hash(&mut hasher);
        application.hash(&mut hasher);

        let mut sorted: Vec<_> = labels.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (k, v) in sorted {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }

        format!("{:016x}", hasher.finish())
    }
}
