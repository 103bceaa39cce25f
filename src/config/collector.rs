//! Collector selection configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::validation::ConfigError;

/// Which registered collectors run.
///
/// Resolved once at startup; see `CollectorRegistry::resolve_active`.
///
/// ```yaml
/// collectors:
///   all: false
///   enable: []
///   disable: [fsa]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSelection {
    /// Enable every registered collector, including those off by default.
    pub all: bool,

    /// Collectors to enable in addition to the defaults.
    pub enable: Vec<String>,

    /// Collectors to disable. Wins over `enable` and `all`.
    pub disable: Vec<String>,
}

impl CollectorSelection {
    /// Validate the selection against the registered collector names.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` for unknown names, duplicates,
    /// or a name that is both enabled and disabled.
    pub fn validate(&self, known: &[&str]) -> Result<(), ConfigError> {
        for (list, names) in [("enable", &self.enable), ("disable", &self.disable)] {
            let mut seen = HashSet::new();
            for name in names {
                if !known.contains(&name.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "collectors.{}: unknown collector '{}' (known: {})",
                        list,
                        name,
                        known.join(", ")
                    )));
                }
                if !seen.insert(name.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "collectors.{}: duplicate collector '{}'",
                        list, name
                    )));
                }
            }
        }

        if let Some(name) = self.enable.iter().find(|n| self.disable.contains(n)) {
            return Err(ConfigError::ValidationError(format!(
                "collector '{}' is both enabled and disabled",
                name
            )));
        }

        Ok(())
    }

    /// Merge CLI selections on top of file selections.
    ///
    /// A name given on the CLI overrides the opposite file list.
    pub fn merge(mut self, other: Self) -> Self {
        self.all |= other.all;
        for name in other.enable {
            self.disable.retain(|n| *n != name);
            if !self.enable.contains(&name) {
                self.enable.push(name);
            }
        }
        for name in other.disable {
            self.enable.retain(|n| *n != name);
            if !self.disable.contains(&name) {
                self.disable.push(name);
            }
        }
        self
    }
}
