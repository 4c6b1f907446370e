//! Configuration for the drift pipeline
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (drift.toml)
//! - Environment variables (DRIFT_*)
//!
//! The loaded object is passed into the pipeline at construction time; there
//! is no process-wide registry of export identities.
//!
//! ## Example config file (drift.toml):
//! ```toml
//! [registry]
//! path = "./drift-registry"
//! identity = "warehouse-export"
//!
//! [inference]
//! mode = "auto"
//! sample_size = 1000
//! sample_strategy = "stratified"
//! max_depth = 10
//! max_array_sample = 100
//!
//! [validation]
//! fail_on_breaking = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::infer::InferenceConfig;

/// Main configuration for a drift pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Schema inference settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Validation behavior
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path to the registry root for this export identity
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,

    /// Export identity label, used in logs only
    #[serde(default)]
    pub identity: Option<String>,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Treat breaking changes as a run failure (non-zero exit in the CLI)
    #[serde(default)]
    pub fail_on_breaking: bool,

    /// Cap on records loaded per file
    #[serde(default = "default_max_records")]
    pub max_records_per_file: usize,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("./drift-registry")
}

fn default_max_records() -> usize {
    10_000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            identity: None,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            fail_on_breaking: false,
            max_records_per_file: default_max_records(),
        }
    }
}

impl DriftConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["drift.toml", ".drift.toml", "config/drift.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schema-drift")
        {
            let xdg_config = config_dir.config_dir().join("drift.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("DRIFT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Registry path with relative paths resolved against the current dir
    pub fn registry_path(&self) -> PathBuf {
        if self.registry.path.is_absolute() {
            self.registry.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.registry.path)
        }
    }
}
