//! Latemod Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all latemod crates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the module-bypass (ignore) sets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Exact module names that must always load eagerly
    #[serde(default)]
    pub names: Vec<String>,
    /// Package-name prefixes that must always load eagerly
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Lowercase source-path substrings that must always load eagerly
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Verbosity of the import report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// No diagnostics
    #[default]
    Off,
    /// Per-load events and summary counts
    Verbose,
    /// Per-load events plus full identifier lists on every event
    VerboseDetail,
}

/// Configuration for a module registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Ordered search roots (directories or `.lpk` archives)
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
    /// Extra entries merged into the default ignore sets
    #[serde(default)]
    pub ignore: IgnoreConfig,
    /// Import report verbosity
    #[serde(default)]
    pub report: ReportMode,
}

/// Subsystem enum for per-target log filtering
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subsystem {
    Registry,
    Resolver,
    Hooks,
    Loader,
}

impl Subsystem {
    /// Get the string name of the subsystem
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Registry => "registry",
            Subsystem::Resolver => "resolver",
            Subsystem::Hooks => "hooks",
            Subsystem::Loader => "loader",
        }
    }

    /// Get the log target name for this subsystem
    pub fn target(&self) -> String {
        format!("latemod::{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_config() {
        let cfg = RegistryConfig::default();
        assert!(cfg.search_roots.is_empty());
        assert!(cfg.ignore.names.is_empty());
        assert_eq!(cfg.report, ReportMode::Off);
    }

    #[test]
    fn test_subsystem_target() {
        assert_eq!(Subsystem::Resolver.as_str(), "resolver");
        assert_eq!(Subsystem::Hooks.target(), "latemod::hooks");
    }

    #[test]
    fn test_report_mode_deserialize() {
        let mode: ReportMode = serde_json::from_str("\"verbose\"").unwrap();
        assert_eq!(mode, ReportMode::Verbose);
        let mode: ReportMode = serde_json::from_str("\"verbose_detail\"").unwrap();
        assert_eq!(mode, ReportMode::VerboseDetail);
    }

    #[test]
    fn test_registry_config_from_json() {
        let json = r#"{
            "search_roots": ["mods", "bundle.lpk"],
            "ignore": { "names": ["telemetry"], "prefixes": ["boot"] },
            "report": "verbose"
        }"#;
        let cfg: RegistryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.search_roots.len(), 2);
        assert_eq!(cfg.ignore.names, vec!["telemetry"]);
        assert_eq!(cfg.ignore.prefixes, vec!["boot"]);
        assert!(cfg.ignore.paths.is_empty());
        assert_eq!(cfg.report, ReportMode::Verbose);
    }
}
