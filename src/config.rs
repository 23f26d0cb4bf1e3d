use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration.
///
/// All fields default so an empty config file (or `EngineConfig::default()`)
/// yields a working engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Maximum drafter invocations per turn (the revision budget).
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    /// Minimum score a required review dimension must reach when a critique
    /// carries no explicit verdict.
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: f64,
    /// How much session state each role invocation sees.
    #[serde(default)]
    pub context: ContextLimits,
    /// Where session snapshots and checkpoint logs live.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            approval_threshold: default_approval_threshold(),
            context: ContextLimits::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Tail sizes for the per-role view of session state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextLimits {
    /// Messages from the end of the log.
    #[serde(default = "default_message_tail")]
    pub message_tail: usize,
    /// Most recent critiques the drafter sees when revising.
    #[serde(default = "default_recent_critiques")]
    pub recent_critiques: usize,
    /// Most recent scratchpad notes passed along.
    #[serde(default = "default_scratchpad_notes")]
    pub scratchpad_notes: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            message_tail: default_message_tail(),
            recent_critiques: default_recent_critiques(),
            scratchpad_notes: default_scratchpad_notes(),
        }
    }
}

/// Storage location configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for session storage. When absent, the home-based
    /// default (`~/.exercise-foundry/sessions/`) is used.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

pub(crate) fn default_max_revisions() -> u32 {
    3
}

pub(crate) fn default_approval_threshold() -> f64 {
    0.7
}

fn default_message_tail() -> usize {
    20
}

fn default_recent_critiques() -> usize {
    2
}

fn default_scratchpad_notes() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_revisions, 3);
        assert_eq!(config.approval_threshold, 0.7);
        assert_eq!(config.context.message_tail, 20);
        assert_eq!(config.context.recent_critiques, 2);
        assert_eq!(config.context.scratchpad_notes, 3);
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "max_revisions: 5\ncontext:\n  recent_critiques: 4\n";
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_revisions, 5);
        assert_eq!(config.approval_threshold, 0.7);
        assert_eq!(config.context.recent_critiques, 4);
        assert_eq!(config.context.message_tail, 20);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foundry.yaml");
        std::fs::write(&path, "approval_threshold: 0.8\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.approval_threshold, 0.8);

        assert!(EngineConfig::load(&dir.path().join("missing.yaml")).is_err());
    }
}
