//! Engine configuration

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};

/// Tunables shared by the rule engine and history
///
/// Passed explicitly to the components that need it; the engine keeps no
/// global configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of snapshots retained by [`crate::History`]
    pub history_capacity: usize,
    /// Volts assumed by the power-budget rule when a rail declares none
    pub reference_voltage: f64,
    /// Whether validation and rules visit nested child diagrams
    pub recurse_into_children: bool,
    /// Rules run when the caller selects none; `None` means all
    pub enabled_rules: Option<Vec<String>>,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys take their defaults
    ///
    /// # Errors
    /// Returns [`crate::EngineError::Config`] on malformed TOML
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// With history capacity
    #[inline]
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// With reference voltage
    #[inline]
    #[must_use]
    pub fn with_reference_voltage(mut self, volts: f64) -> Self {
        self.reference_voltage = volts;
        self
    }

    /// With child-diagram recursion toggled
    #[inline]
    #[must_use]
    pub fn with_recursion(mut self, recurse: bool) -> Self {
        self.recurse_into_children = recurse;
        self
    }

    /// With a default rule selection
    #[must_use]
    pub fn with_enabled_rules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_rules = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            reference_voltage: 3.3,
            recurse_into_children: true,
            enabled_rules: None,
        }
    }
}
