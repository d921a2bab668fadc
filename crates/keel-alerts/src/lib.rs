//! # keel-alerts
//!
//! Alert evaluation and notification routing for sync-state transitions.
//!
//! The [`AlertEvaluator`] runs a state machine per (Application, rule):
//! `Inactive -> Pending -> Firing -> Resolved -> Inactive`. A rule's
//! condition must hold continuously for its `for` duration before the
//! alert fires, which debounces flapping; resolved alerts are retained
//! for a grace period and then garbage-collected.
//!
//! The [`NotificationRouter`] delivers fired and resolved alerts through
//! independent channels with bounded, best-effort retries. Inhibition is
//! a pure function over the currently-firing set, applied at delivery
//! time only — inhibited alerts keep advancing through the state machine
//! but produce no delivery attempts.
//!
//! # Example
//!
//! ```rust
//! use keel_alerts::{AlertCondition, AlertEvaluator, AlertRule, AlertSeverity, AppStatusSnapshot};
//! use keel_core::{AppHealth, SyncStatus};
//!
//! let evaluator = AlertEvaluator::new();
//! let rule = AlertRule::builder("AppOutOfSync", AlertCondition::SyncStatusIs(SyncStatus::OutOfSync))
//!     .severity(AlertSeverity::Warning)
//!     .build()
//!     .unwrap();
//! evaluator.add_rule(rule).unwrap();
//!
//! let snapshot = AppStatusSnapshot::new("web", SyncStatus::OutOfSync, AppHealth::Healthy, 0);
//! let outcome = evaluator.evaluate(&[snapshot]);
//! assert_eq!(outcome.fired.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channels;
pub mod error;
mod evaluator;
mod inhibit;
mod router;
mod types;

pub use channels::{
    EmailChannel, EmailConfig, LogChannel, Notification, NotificationChannel, NotificationResult,
    NotificationStatus, WebhookChannel, WebhookConfig,
};
pub use error::{AlertError, Result};
pub use evaluator::{AlertEvaluator, EvaluationOutcome, EvaluatorConfig};
pub use inhibit::{is_inhibited, InhibitionRule};
pub use router::{DeliveryAttempt, DispatchSummary, NotificationRouter, RouterConfig};
pub use types::{
    AlertCondition, AlertInstance, AlertRule, AlertRuleBuilder, AlertSeverity, AlertState,
    AppStatusSnapshot, ComparisonOperator,
};
