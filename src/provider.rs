//! # Provider collaborator boundary.
//!
//! The agent that embeds the orchestrator knows about cluster descriptions and
//! the roles it can host; the engine only needs a narrow view of both.
//!
//! - [`ProviderRole`] a role name the provider can launch
//! - [`ClusterInfo`] read-only key lookup into the cluster description
//! - [`info_or_na`] / [`command_line`] small helpers used when building
//!   commands and status reports

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Placeholder reported for missing cluster information.
pub const NOT_AVAILABLE: &str = "N/A";

/// A role supported by the provider (e.g. "master", "worker").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderRole {
    name: String,
    key: u32,
}

impl ProviderRole {
    pub fn new(name: impl Into<String>, key: u32) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }

    /// Role name as it appears in cluster descriptions.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable numeric key, unique per provider.
    pub fn key(&self) -> u32 {
        self.key
    }
}

impl fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Read-only view of cluster information.
pub trait ClusterInfo {
    /// Value stored under `key`.
    fn get_info(&self, key: &str) -> Option<String>;
}

impl ClusterInfo for BTreeMap<String, String> {
    fn get_info(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ClusterInfo for HashMap<String, String> {
    fn get_info(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Value of `key`, or `"N/A"` when absent.
pub fn info_or_na(cluster: &dyn ClusterInfo, key: &str) -> String {
    cluster
        .get_info(key)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Joins arguments with single spaces, for logging and status output.
pub fn command_line<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for arg in args {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(arg.as_ref());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_info_reads_as_na() {
        let mut info = BTreeMap::new();
        info.insert("master.url".to_string(), "http://node1:60010".to_string());

        assert_eq!(info_or_na(&info, "master.url"), "http://node1:60010");
        assert_eq!(info_or_na(&info, "worker.url"), "N/A");
    }

    #[test]
    fn command_line_joins_with_spaces() {
        assert_eq!(command_line(["bin/hbase", "master", "start"]), "bin/hbase master start");
        assert_eq!(command_line(Vec::<String>::new()), "");
    }
}
