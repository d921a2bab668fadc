//! Reconciler configuration.

use std::time::Duration;

use keel_sync::SyncOptions;

/// Tunable intervals and sync behavior for the control loop.
///
/// The defaults are reasonable for an interactive deployment loop; none
/// of them is contractual, which is why they all live here.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How often each Application is polled and reconciled.
    pub poll_interval: Duration,
    /// How often alert rules are evaluated against the status store.
    pub alert_interval: Duration,
    /// Retry and backoff behavior handed to the sync executor.
    pub sync_options: SyncOptions,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            alert_interval: Duration::from_secs(15),
            sync_options: SyncOptions::default(),
        }
    }
}

impl ReconcilerConfig {
    /// A configuration with no retry waits, for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            alert_interval: Duration::from_millis(10),
            sync_options: SyncOptions::immediate(),
        }
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the alert evaluation interval.
    #[must_use]
    pub const fn with_alert_interval(mut self, interval: Duration) -> Self {
        self.alert_interval = interval;
        self
    }

    /// Sets the sync options.
    #[must_use]
    pub fn with_sync_options(mut self, options: SyncOptions) -> Self {
        self.sync_options = options;
        self
    }
}
