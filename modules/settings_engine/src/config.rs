//! Configuration for settings engine module

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SETTINGS_ENGINE_";

/// Settings engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Maximum number of items applied concurrently within one wave
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,

    /// Run raw imports on behalf of the interactive user when one is found
    #[serde(default = "default_true")]
    pub prefer_interactive_user: bool,

    /// Cache discovered setting states between applies
    #[serde(default = "default_true")]
    pub discovery_cache: bool,

    /// Directory for raw import scratch files (system temp dir when unset)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Settings catalog file (YAML or JSON) loaded when no catalog is supplied
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_parallelism: default_max_parallelism(),
            prefer_interactive_user: true,
            discovery_cache: true,
            scratch_dir: None,
            catalog_path: None,
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the optional YAML file, then
    /// `SETTINGS_ENGINE_*` environment variables
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    pub fn load_with_env_prefix(path: Option<&Path>, env_prefix: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("configuration file not found: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment.merge(Env::prefixed(env_prefix)).extract()?;
        Ok(config)
    }
}

fn default_max_parallelism() -> usize {
    4
}

fn default_true() -> bool {
    true
}
