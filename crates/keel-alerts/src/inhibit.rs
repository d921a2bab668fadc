//! Alert inhibition.
//!
//! Inhibition suppresses delivery of lower-priority alerts while a
//! related higher-priority alert is firing, so a cascading failure does
//! not turn into a notification storm. It is a pure function over the
//! current firing set, checked at delivery time; the evaluator's state
//! machines advance regardless.

use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::types::{AlertInstance, AlertSeverity, AlertState};

/// Declares that firing alerts of one severity suppress delivery of
/// another, lower severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InhibitionRule {
    /// The severity whose firing alerts act as suppressors.
    pub source_severity: AlertSeverity,
    /// The severity whose delivery is suppressed.
    pub suppressed_severity: AlertSeverity,
    /// When true, only alerts for the same Application are suppressed.
    pub same_application: bool,
}

impl InhibitionRule {
    /// Creates a rule scoped to the same Application.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidInhibition` if the source severity
    /// does not outrank the suppressed severity; an equal or inverted
    /// pair would let alerts silence their own class.
    pub fn new(source: AlertSeverity, suppressed: AlertSeverity) -> Result<Self> {
        if source.priority() <= suppressed.priority() {
            return Err(AlertError::InvalidInhibition {
                reason: format!(
                    "source severity '{source}' must outrank suppressed severity '{suppressed}'"
                ),
            });
        }
        Ok(Self {
            source_severity: source,
            suppressed_severity: suppressed,
            same_application: true,
        })
    }

    /// Creates a rule that suppresses across all Applications.
    ///
    /// # Errors
    ///
    /// Same validation as [`InhibitionRule::new`].
    pub fn global(source: AlertSeverity, suppressed: AlertSeverity) -> Result<Self> {
        let mut rule = Self::new(source, suppressed)?;
        rule.same_application = false;
        Ok(rule)
    }

    /// Returns true if `candidate`'s delivery is suppressed by
    /// `suppressor` under this rule.
    #[must_use]
    pub fn applies(&self, candidate: &AlertInstance, suppressor: &AlertInstance) -> bool {
        if suppressor.state != AlertState::Firing {
            return false;
        }
        if suppressor.fingerprint == candidate.fingerprint {
            return false;
        }
        if suppressor.severity != self.source_severity
            || candidate.severity != self.suppressed_severity
        {
            return false;
        }
        if self.same_application && suppressor.application != candidate.application {
            return false;
        }
        true
    }
}

/// Returns true if delivery of `alert` is suppressed by any rule given
/// the currently firing alerts.
#[must_use]
pub fn is_inhibited(
    alert: &AlertInstance,
    firing: &[AlertInstance],
    rules: &[InhibitionRule],
) -> bool {
    rules
        .iter()
        .any(|rule| firing.iter().any(|suppressor| rule.applies(alert, suppressor)))
}
