use crate::errors::ConfigError;
use std::{collections::HashMap, env, fs, path::{Path, PathBuf}};
use tracing::debug;

use super::app_config::{ContainerConfig, PartialContainerConfig, ENV_CONFIG_PATH};

const ENV_PREFIX: &str = "SERVICE_REGISTRY_";

/// Configuration loader responsible for loading config from files and environment
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that reads the file named by `SERVICE_REGISTRY_CONFIG`, if any
    pub fn new() -> Self {
        Self { path: None }
    }

    /// Create a loader for an explicit file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    /// Load complete container configuration. A missing file yields defaults.
    pub fn load_config(&self) -> Result<ContainerConfig, ConfigError> {
        let env_map = self.collect_env_vars();

        let partial = match self.config_path(&env_map) {
            Some(path) => self.load_partial_config(&path)?,
            None => None,
        };

        ContainerConfig::from_partial_and_env(partial, &env_map)
    }

    /// Explicit path first, then the environment; `~` is expanded
    fn config_path(&self, env_map: &HashMap<String, String>) -> Option<PathBuf> {
        let raw = match &self.path {
            Some(path) => path.to_string_lossy().into_owned(),
            None => env_map.get(ENV_CONFIG_PATH)?.clone(),
        };
        Some(PathBuf::from(shellexpand::tilde(&raw).as_ref()))
    }

    fn load_partial_config(&self, path: &Path) -> Result<Option<PartialContainerConfig>, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(None);
        }

        let shown = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::FileRead(shown.clone(), e))?;
        let partial = toml::from_str(&content).map_err(|e| ConfigError::TomlParse(shown.clone(), e))?;

        debug!(path = %shown, "Loaded config file");
        Ok(Some(partial))
    }

    /// Collect environment variables relevant to configuration
    fn collect_env_vars(&self) -> HashMap<String, String> {
        env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)).collect()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
