//! Notification routing.
//!
//! The router fans one alert out to every registered channel. Channels
//! are independent: each gets its own retry budget and a failure on one
//! never blocks another. Delivery is best-effort; after the retry bound
//! is exhausted the failure is logged and the alert is dropped for that
//! channel. Inhibition is applied here, at delivery time, over the
//! currently-firing set.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::channels::{Notification, NotificationChannel};
use crate::inhibit::{is_inhibited, InhibitionRule};
use crate::types::AlertInstance;

/// Configuration for the notification router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Retries per channel after the initial attempt.
    pub retry_limit: u32,
    /// Linear backoff step between attempts on the same channel.
    pub retry_backoff: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            retry_limit: 2,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl RouterConfig {
    /// A configuration with no waiting between retries, for tests.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            retry_limit: 2,
            retry_backoff: Duration::ZERO,
        }
    }
}

/// One delivery attempt against one channel.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    /// The channel attempted.
    pub channel: String,
    /// 1-based attempt number within the channel's budget.
    pub attempt: u32,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Error detail when the attempt failed.
    pub error: Option<String>,
    /// When the attempt completed.
    pub at: DateTime<Utc>,
}

/// The outcome of routing one alert.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    /// Every attempt made, across all channels.
    pub attempts: Vec<DeliveryAttempt>,
    /// True if delivery was suppressed by an inhibition rule.
    pub inhibited: bool,
}

impl DispatchSummary {
    /// Returns true if every channel that was attempted succeeded.
    #[must_use]
    pub fn all_delivered(&self) -> bool {
        let mut delivered: std::collections::HashMap<&str, bool> = std::collections::HashMap::new();
        for attempt in &self.attempts {
            let entry = delivered.entry(attempt.channel.as_str()).or_insert(false);
            *entry = *entry || attempt.success;
        }
        !delivered.is_empty() && delivered.values().all(|&ok| ok)
    }

    /// Returns the attempts made against one channel.
    #[must_use]
    pub fn for_channel(&self, channel: &str) -> Vec<&DeliveryAttempt> {
        self.attempts
            .iter()
            .filter(|a| a.channel == channel)
            .collect()
    }
}

/// Routes alerts to notification channels.
pub struct NotificationRouter {
    config: RouterConfig,
    channels: Vec<Arc<dyn NotificationChannel>>,
    inhibitions: Vec<InhibitionRule>,
}

impl NotificationRouter {
    /// Creates a router with default configuration and no channels.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Creates a router with the given configuration.
    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            channels: Vec::new(),
            inhibitions: Vec::new(),
        }
    }

    /// Registers a channel.
    pub fn add_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        info!(channel = %channel.name(), "notification channel registered");
        self.channels.push(channel);
    }

    /// Registers an inhibition rule.
    pub fn add_inhibition(&mut self, rule: InhibitionRule) {
        self.inhibitions.push(rule);
    }

    /// Returns the registered channel names.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Routes one alert to every enabled channel.
    ///
    /// `firing` is the current firing set used for inhibition checks.
    /// An inhibited alert produces zero delivery attempts.
    pub async fn route(&self, alert: &AlertInstance, firing: &[AlertInstance]) -> DispatchSummary {
        if is_inhibited(alert, firing, &self.inhibitions) {
            debug!(
                rule = %alert.rule_name,
                application = %alert.application,
                "delivery inhibited by higher-priority alert"
            );
            return DispatchSummary {
                attempts: Vec::new(),
                inhibited: true,
            };
        }

        let notification = Notification::new(alert.clone());
        let deliveries = self
            .channels
            .iter()
            .filter(|c| c.is_enabled())
            .map(|channel| self.deliver_with_retries(Arc::clone(channel), notification.clone()));

        let per_channel = join_all(deliveries).await;
        DispatchSummary {
            attempts: per_channel.into_iter().flatten().collect(),
            inhibited: false,
        }
    }

    /// Delivers to one channel, retrying with linear backoff within the
    /// configured bound.
    async fn deliver_with_retries(
        &self,
        channel: Arc<dyn NotificationChannel>,
        notification: Notification,
    ) -> Vec<DeliveryAttempt> {
        let mut attempts = Vec::new();

        for attempt in 1..=(self.config.retry_limit + 1) {
            if attempt > 1 {
                // Linear: step, 2*step, ...
                let delay = self.config.retry_backoff * (attempt - 1);
                tokio::time::sleep(delay).await;
            }

            let outcome = channel.send(&notification);
            match outcome {
                Ok(result) if result.success => {
                    attempts.push(DeliveryAttempt {
                        channel: channel.name().to_string(),
                        attempt,
                        success: true,
                        error: None,
                        at: Utc::now(),
                    });
                    return attempts;
                }
                Ok(result) => {
                    attempts.push(DeliveryAttempt {
                        channel: channel.name().to_string(),
                        attempt,
                        success: false,
                        error: result.message,
                        at: Utc::now(),
                    });
                }
                Err(err) => {
                    attempts.push(DeliveryAttempt {
                        channel: channel.name().to_string(),
                        attempt,
                        success: false,
                        error: Some(err.to_string()),
                        at: Utc::now(),
                    });
                }
            }
        }

        warn!(
            channel = %channel.name(),
            rule = %notification.alert.rule_name,
            attempts = attempts.len(),
            "notification dropped after exhausting retries"
        );
        attempts
    }
}

impl Default for NotificationRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{LogChannel, NotificationResult};
    use crate::error::Result;
    use crate::types::{AlertCondition, AlertRule, AlertSeverity};
    use keel_core::SyncStatus;
    use parking_lot::Mutex;

    /// A channel that fails a fixed number of times before succeeding.
    #[derive(Debug)]
    struct FlakyChannel {
        name: String,
        failures_remaining: Mutex<u32>,
        calls: Mutex<u32>,
    }

    impl FlakyChannel {
        fn new(name: &str, failures: u32) -> Self {
            Self {
                name: name.to_string(),
                failures_remaining: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    impl NotificationChannel for FlakyChannel {
        fn name(&self) -> &str {
            &self.name
        }

        fn send(&self, _notification: &Notification) -> Result<NotificationResult> {
            *self.calls.lock() += 1;
            let mut remaining = self.failures_remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                Ok(NotificationResult::failure(&self.name, "connection refused"))
            } else {
                Ok(NotificationResult::success(&self.name))
            }
        }
    }

    fn firing_alert(severity: AlertSeverity, app: &str) -> AlertInstance {
        let rule = AlertRule::builder(
            "AppOutOfSync",
            AlertCondition::SyncStatusIs(SyncStatus::OutOfSync),
        )
        .severity(severity)
        .build()
        .unwrap();
        let now = Utc::now();
        let mut alert = AlertInstance::new_pending(&rule, app, now);
        alert.fire(now);
        alert
    }

    #[tokio::test]
    async fn delivers_to_all_channels() {
        let mut router = NotificationRouter::with_config(RouterConfig::immediate());
        router.add_channel(Arc::new(LogChannel::new("log-a")));
        router.add_channel(Arc::new(LogChannel::new("log-b")));

        let alert = firing_alert(AlertSeverity::Warning, "web");
        let summary = router.route(&alert, &[alert.clone()]).await;

        assert!(!summary.inhibited);
        assert_eq!(summary.attempts.len(), 2);
        assert!(summary.all_delivered());
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let flaky = Arc::new(FlakyChannel::new("flaky", 2));
        let mut router = NotificationRouter::with_config(RouterConfig::immediate());
        router.add_channel(Arc::clone(&flaky) as Arc<dyn NotificationChannel>);

        let alert = firing_alert(AlertSeverity::Warning, "web");
        let summary = router.route(&alert, &[alert.clone()]).await;

        assert_eq!(flaky.calls(), 3);
        let attempts = summary.for_channel("flaky");
        assert_eq!(attempts.len(), 3);
        assert!(!attempts[0].success);
        assert!(!attempts[1].success);
        assert!(attempts[2].success);
        assert!(summary.all_delivered());
    }

    #[tokio::test]
    async fn drops_after_retry_bound() {
        let flaky = Arc::new(FlakyChannel::new("flaky", 10));
        let mut router = NotificationRouter::with_config(RouterConfig::immediate());
        router.add_channel(Arc::clone(&flaky) as Arc<dyn NotificationChannel>);

        let alert = firing_alert(AlertSeverity::Warning, "web");
        let summary = router.route(&alert, &[alert.clone()]).await;

        // Initial attempt plus retry_limit retries, then dropped.
        assert_eq!(flaky.calls(), 3);
        assert!(!summary.all_delivered());
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_healthy_one() {
        let flaky = Arc::new(FlakyChannel::new("flaky", 10));
        let mut router = NotificationRouter::with_config(RouterConfig::immediate());
        router.add_channel(Arc::clone(&flaky) as Arc<dyn NotificationChannel>);
        router.add_channel(Arc::new(LogChannel::new("log")));

        let alert = firing_alert(AlertSeverity::Warning, "web");
        let summary = router.route(&alert, &[alert.clone()]).await;

        let log_attempts = summary.for_channel("log");
        assert_eq!(log_attempts.len(), 1);
        assert!(log_attempts[0].success);
    }

    #[tokio::test]
    async fn inhibited_alert_produces_zero_attempts() {
        let mut router = NotificationRouter::with_config(RouterConfig::immediate());
        router.add_channel(Arc::new(LogChannel::default()));
        router.add_inhibition(
            InhibitionRule::new(AlertSeverity::Critical, AlertSeverity::Warning).unwrap(),
        );

        let critical = firing_alert(AlertSeverity::Critical, "web");
        let warning = firing_alert(AlertSeverity::Warning, "web");
        let firing = vec![critical.clone(), warning.clone()];

        let summary = router.route(&warning, &firing).await;
        assert!(summary.inhibited);
        assert!(summary.attempts.is_empty());

        // The suppressor itself still delivers.
        let summary = router.route(&critical, &firing).await;
        assert!(!summary.inhibited);
        assert_eq!(summary.attempts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn linear_backoff_between_retries() {
        let flaky = Arc::new(FlakyChannel::new("flaky", 2));
        let mut router = NotificationRouter::with_config(RouterConfig {
            retry_limit: 2,
            retry_backoff: Duration::from_secs(2),
        });
        router.add_channel(Arc::clone(&flaky) as Arc<dyn NotificationChannel>);

        let start = tokio::time::Instant::now();
        let alert = firing_alert(AlertSeverity::Warning, "web");
        router.route(&alert, &[alert.clone()]).await;

        // Waits of 2s then 4s between the three attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }
}
