//! # Engine and unit configuration.
//!
//! Provides [`Config`], the read-only configuration handed to every unit
//! through `init(&Config)`.
//!
//! Config is used in two ways:
//! 1. **Runtime wiring**: [`Orchestrator::builder`](crate::Orchestrator::builder) sizes the event bus from it.
//! 2. **Unit initialization**: each step validates and captures the settings it needs.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by [`Config::bus_capacity_clamped`]
//! - `output_lines = 0` → process output is logged but not retained
//! - `working_dir = None` → processes inherit the agent's working directory

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ServiceError;

/// Configuration shared by the orchestrator and its units.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `inherit_env`: Whether spawned processes inherit the agent's environment
/// - `working_dir`: Working directory for spawned processes (must exist)
/// - `output_lines`: How many recent output lines each process step retains
/// - `properties`: Free-form string keys read by steps and callers
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Spawned processes start from the agent's environment when `true`;
    /// otherwise they see only the environment given to `build`.
    pub inherit_env: bool,

    /// Working directory for spawned processes.
    pub working_dir: Option<PathBuf>,

    /// Number of most recent stdout/stderr lines kept per process step.
    pub output_lines: usize,

    /// Read-only string properties.
    pub properties: BTreeMap<String, String>,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Looks up a string property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Looks up a string property, falling back to `default`.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Looks up a required property.
    pub fn require(&self, key: &str) -> Result<&str, ServiceError> {
        self.get(key).ok_or_else(|| ServiceError::Config {
            key: key.to_string(),
            reason: "missing".to_string(),
        })
    }

    /// Returns a copy with the property set.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a copy with the working directory set.
    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Validates the settings units depend on.
    ///
    /// Called by every `init`; fails fast instead of defaulting silently.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(dir) = &self.working_dir {
            if !dir.is_dir() {
                return Err(ServiceError::Config {
                    key: "working_dir".to_string(),
                    reason: format!("{} is not a directory", dir.display()),
                });
            }
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `inherit_env = true`
    /// - `working_dir = None`
    /// - `output_lines = 64`
    /// - `properties` empty
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            inherit_env: true,
            working_dir: None,
            output_lines: 64,
            properties: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_are_read_only_lookups() {
        let cfg = Config::default().with_property("hbase.master.port", "60000");
        assert_eq!(cfg.get("hbase.master.port"), Some("60000"));
        assert_eq!(cfg.get_or("missing", "N/A"), "N/A");
        assert!(matches!(
            cfg.require("missing"),
            Err(ServiceError::Config { ref key, .. }) if key == "missing"
        ));
    }

    #[test]
    fn missing_working_dir_is_rejected() {
        let cfg = Config::default().with_working_dir("/definitely/not/here/seqvisor");
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "invalid_config");

        let cfg = Config::default().with_working_dir(std::env::temp_dir());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config { bus_capacity: 0, ..Config::default() };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
