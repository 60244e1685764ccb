//! Monitor configuration.

use crate::TrackerResult;
use serde::{Deserialize, Serialize};

/// Tunables for a [`Monitor`](crate::Monitor).
///
/// Every field has a default, so a partial TOML document is valid:
///
/// ```toml
/// excluded_properties = ["row_version"]
/// dispose_removed_new = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Property names that are never tracked, on any entity type.
    pub excluded_properties: Vec<String>,
    /// Dispose a still-new entity when it is removed from a tracked
    /// collection. `reject_changes` always disposes the new entities it
    /// drops.
    pub dispose_removed_new: bool,
    /// Let accept/reject also re-baseline and restore the membership of
    /// entity collections attached to the monitor.
    pub restore_collection_membership: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            excluded_properties: Vec::new(),
            dispose_removed_new: true,
            restore_collection_membership: true,
        }
    }
}

impl MonitorConfig {
    /// Parses a configuration from TOML.
    pub fn from_toml_str(contents: &str) -> TrackerResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Adds a property name to the exclusion list.
    #[must_use]
    pub fn exclude(mut self, property: impl Into<String>) -> Self {
        self.excluded_properties.push(property.into());
        self
    }
}
