//! Config file loading for the `keel` binary.
//!
//! The file is JSON: Application definitions, the manifest set each one
//! should converge to, and optional alert rules. The manifest sets seed
//! the in-memory source the loop runs against.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use keel_alerts::{AlertCondition, AlertRule, AlertSeverity};
use keel_core::{Application, Manifest, ResourceKey};

/// The parsed config file.
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    /// Applications to reconcile.
    pub applications: Vec<AppSpec>,
    /// Alert rules to evaluate against Application status.
    #[serde(default)]
    pub alert_rules: Vec<RuleSpec>,
}

impl FileConfig {
    /// Loads and parses the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        if config.applications.is_empty() {
            anyhow::bail!("config file {} defines no applications", path.display());
        }
        Ok(config)
    }
}

/// One Application plus the desired state it should converge to.
#[derive(Debug, Deserialize)]
pub struct AppSpec {
    /// The Application definition.
    #[serde(flatten)]
    pub application: Application,
    /// The revision label for the manifest set.
    pub revision: String,
    /// The manifests declared at that revision.
    pub manifests: Vec<ManifestSpec>,
}

impl AppSpec {
    /// Resolves the manifest specs, defaulting the namespace to the
    /// Application's destination.
    pub fn manifests(&self) -> Vec<Manifest> {
        self.manifests
            .iter()
            .map(|m| {
                let namespace = m
                    .namespace
                    .clone()
                    .unwrap_or_else(|| self.application.destination_namespace.clone());
                Manifest::new(
                    ResourceKey::new(m.kind.clone(), namespace, m.name.clone()),
                    m.spec.clone(),
                )
            })
            .collect()
    }
}

/// One declared resource in a config file.
#[derive(Debug, Deserialize)]
pub struct ManifestSpec {
    /// Resource kind.
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// Namespace; defaults to the Application's destination.
    #[serde(default)]
    pub namespace: Option<String>,
    /// The declared spec.
    pub spec: serde_json::Value,
}

/// One alert rule in a config file.
#[derive(Debug, Deserialize)]
pub struct RuleSpec {
    /// Rule name.
    pub name: String,
    /// Condition to watch; see [`AlertCondition`] for the shape.
    #[serde(flatten)]
    pub condition: AlertCondition,
    /// Debounce window in seconds.
    #[serde(default)]
    pub for_duration_secs: u64,
    /// Severity; defaults to warning.
    #[serde(default)]
    pub severity: AlertSeverity,
}

impl RuleSpec {
    /// Builds the alert rule.
    pub fn build(self) -> Result<AlertRule> {
        AlertRule::builder(self.name, self.condition)
            .for_duration_secs(self.for_duration_secs)
            .severity(self.severity)
            .build()
            .context("invalid alert rule in config file")
    }
}
