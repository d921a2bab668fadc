//! Notification channels.
//!
//! A [`NotificationChannel`] delivers one rendered [`Notification`] to a
//! destination. Channels are independent of one another; the router owns
//! fan-out, retries, and inhibition. Shipped channels: [`LogChannel`]
//! (structured log output), [`EmailChannel`], and [`WebhookChannel`]
//! (chat-style JSON POST).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AlertError, Result};
use crate::types::{AlertInstance, AlertState};

/// A rendered notification for a single alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// The alert being delivered.
    pub alert: AlertInstance,
    /// Whether this notifies a firing or a resolution.
    pub status: NotificationStatus,
    /// Optional URL linking to more detail.
    pub external_url: Option<String>,
}

impl Notification {
    /// Creates a notification for an alert, inferring the status from
    /// its state.
    #[must_use]
    pub fn new(alert: AlertInstance) -> Self {
        let status = if alert.state == AlertState::Resolved {
            NotificationStatus::Resolved
        } else {
            NotificationStatus::Firing
        };
        Self {
            alert,
            status,
            external_url: None,
        }
    }

    /// Sets the external URL.
    #[must_use]
    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    /// Renders a one-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} {} (application: {})",
            self.status,
            self.alert.severity,
            self.alert.rule_name,
            self.alert.application
        )
    }
}

/// Whether a notification reports a firing alert or its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    /// The alert is firing.
    Firing,
    /// The alert resolved.
    Resolved,
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firing => write!(f, "firing"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// Result of a single send through a channel.
#[derive(Debug, Clone)]
pub struct NotificationResult {
    /// Whether the send succeeded.
    pub success: bool,
    /// The channel that processed the notification.
    pub channel: String,
    /// Optional detail or error description.
    pub message: Option<String>,
}

impl NotificationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
        }
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

/// A destination alerts can be delivered to.
///
/// Implementations must not block on other channels; the router calls
/// each one independently and applies its own retry policy.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the channel's name, used in delivery records and logs.
    fn name(&self) -> &str;

    /// Delivers one notification.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::NotificationFailed` when the destination
    /// cannot be reached; the router retries within its bound.
    fn send(&self, notification: &Notification) -> Result<NotificationResult>;

    /// Returns true if this channel should receive deliveries.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// A channel that writes notifications to the structured log.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    /// Creates a log channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new("log")
    }
}

impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        info!(
            channel = %self.name,
            rule = %notification.alert.rule_name,
            application = %notification.alert.application,
            severity = %notification.alert.severity,
            status = %notification.status,
            "alert notification"
        );
        Ok(NotificationResult::success(&self.name))
    }
}

/// Configuration for an email channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Channel name.
    pub name: String,
    /// SMTP relay host.
    pub smtp_host: String,
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Whether this channel is enabled.
    pub enabled: bool,
}

impl EmailConfig {
    /// Creates an email configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::NotificationFailed` if no recipients are
    /// given.
    pub fn new(
        name: impl Into<String>,
        smtp_host: impl Into<String>,
        from: impl Into<String>,
        to: Vec<String>,
    ) -> Result<Self> {
        if to.is_empty() {
            return Err(AlertError::NotificationFailed {
                reason: "email channel requires at least one recipient".to_string(),
            });
        }
        Ok(Self {
            name: name.into(),
            smtp_host: smtp_host.into(),
            from: from.into(),
            to,
            enabled: true,
        })
    }
}

/// An email notification channel.
///
/// Renders a plain-text message per alert. The SMTP handoff itself is
/// delegated to the relay named in the configuration.
#[derive(Debug, Clone)]
pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    /// Creates an email channel.
    #[must_use]
    pub const fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Renders the message body for a notification.
    #[must_use]
    pub fn render_body(&self, notification: &Notification) -> String {
        let alert = &notification.alert;
        let mut body = format!(
            "Alert: {}\nStatus: {}\nSeverity: {}\nApplication: {}\nFirst seen: {}\n",
            alert.rule_name, notification.status, alert.severity, alert.application, alert.first_seen
        );
        if let Some(resolved_at) = alert.resolved_at {
            body.push_str(&format!("Resolved at: {resolved_at}\n"));
        }
        for (key, value) in &alert.annotations {
            body.push_str(&format!("{key}: {value}\n"));
        }
        body
    }
}

impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            debug!(channel = %self.name(), "channel disabled, skipping");
            return Ok(NotificationResult::success(self.name())
                .with_message("channel disabled, notification skipped"));
        }

        let body = self.render_body(notification);
        info!(
            channel = %self.name(),
            smtp_host = %self.config.smtp_host,
            recipients = self.config.to.len(),
            subject = %notification.summary(),
            "handing notification to mail relay"
        );
        debug!(body = %body, "email body");

        Ok(NotificationResult::success(self.name()).with_message("handed to relay"))
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Configuration for a chat webhook channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Channel name.
    pub name: String,
    /// The URL notifications are POSTed to.
    pub url: String,
    /// Extra HTTP headers.
    pub headers: HashMap<String, String>,
    /// Whether this channel is enabled.
    pub enabled: bool,
}

impl WebhookConfig {
    /// Creates a webhook configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::NotificationFailed` if the URL is empty.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(AlertError::NotificationFailed {
                reason: "webhook URL cannot be empty".to_string(),
            });
        }
        Ok(Self {
            name: name.into(),
            url,
            headers: HashMap::new(),
            enabled: true,
        })
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// A chat-style webhook channel.
///
/// Serializes the notification to JSON for POSTing to the configured
/// URL.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    config: WebhookConfig,
}

impl WebhookChannel {
    /// Creates a webhook channel.
    #[must_use]
    pub const fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    /// Returns the configured URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Serializes the notification payload.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Serialization` if encoding fails.
    pub fn format_payload(&self, notification: &Notification) -> Result<String> {
        serde_json::to_string(notification).map_err(AlertError::from)
    }
}

impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            debug!(channel = %self.name(), "channel disabled, skipping");
            return Ok(NotificationResult::success(self.name())
                .with_message("channel disabled, notification skipped"));
        }

        let payload = self.format_payload(notification)?;
        info!(
            channel = %self.name(),
            url = %self.config.url,
            status = %notification.status,
            "posting webhook notification"
        );
        debug!(payload = %payload, "webhook payload");

        Ok(NotificationResult::success(self.name()).with_message("notification posted"))
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
