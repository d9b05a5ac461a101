//! Pipeline configuration.
//!
//! Settings come from an optional file (any format the `config` crate
//! understands, picked by extension) overlaid with `QUEUESCOPE_*`
//! environment variables, e.g. `QUEUESCOPE_ACCOUNT_ID=12345`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::hooks::DEFAULT_MAX_HOOKS;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "QUEUESCOPE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fingerprint samples that carry no provider tag.
    pub auto_detect_provider: bool,
    /// Add metadata tags to entities after synthesis.
    pub enrich_with_metadata: bool,
    pub generate_relationships: bool,
    /// Keep internal topics, groups and queues (`__consumer_offsets`, `amq.*`).
    pub include_internal_resources: bool,
    pub max_hooks_per_extension_point: usize,
    pub hook_timeout_ms: u64,
    /// Abort the cycle on the first hook failure.
    pub stop_on_error: bool,
    /// Account scope embedded in every GUID.
    pub account_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_detect_provider: true,
            enrich_with_metadata: true,
            generate_relationships: true,
            include_internal_resources: false,
            max_hooks_per_extension_point: DEFAULT_MAX_HOOKS,
            hook_timeout_ms: 5000,
            stop_on_error: false,
            account_id: "0".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load from an optional file plus environment overrides. Missing keys
    /// take their defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("failed to read pipeline configuration")?;

        config
            .try_deserialize()
            .context("invalid pipeline configuration")
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert!(config.auto_detect_provider);
        assert!(config.generate_relationships);
        assert!(!config.include_internal_resources);
        assert_eq!(config.max_hooks_per_extension_point, 100);
        assert_eq!(config.hook_timeout(), Duration::from_secs(5));
        assert_eq!(config.account_id, "0");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "generate_relationships = false").unwrap();
        writeln!(file, "hook_timeout_ms = 250").unwrap();
        writeln!(file, "stop_on_error = true").unwrap();

        let config = PipelineConfig::load(Some(file.path())).unwrap();
        assert!(!config.generate_relationships);
        assert!(config.stop_on_error);
        assert_eq!(config.hook_timeout(), Duration::from_millis(250));
        assert!(config.enrich_with_metadata);
        assert_eq!(config.max_hooks_per_extension_point, 100);
    }

    #[test]
    fn environment_overrides() {
        std::env::set_var("QUEUESCOPE_ACCOUNT_ID", "98765");
        let config = PipelineConfig::load(None).unwrap();
        std::env::remove_var("QUEUESCOPE_ACCOUNT_ID");

        assert_eq!(config.account_id, "98765");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(PipelineConfig::load(Some(&missing)).is_err());
    }
}
