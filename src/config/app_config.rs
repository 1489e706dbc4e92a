use crate::errors::ConfigError;
use crate::logging::{LogFormat, LoggingConfig};
use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf, str::FromStr, time::Duration};
use tracing::Level;

use super::loader::ConfigLoader;

// Environment variables
pub const ENV_CONFIG_PATH: &str = "SERVICE_REGISTRY_CONFIG";
pub const ENV_LOG_LEVEL: &str = "SERVICE_REGISTRY_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "SERVICE_REGISTRY_LOG_FORMAT";
pub const ENV_SLOW_PARTICIPANT_MS: &str = "SERVICE_REGISTRY_SLOW_PARTICIPANT_MS";

/// Default warning threshold for a single lifetime callback.
pub const DEFAULT_SLOW_PARTICIPANT_MS: u64 = 5_000;

/// Lifetime manager settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifetimeConfig {
    /// Callbacks running at least this long are logged as slow; 0 disables the warning.
    pub slow_participant_warn_ms: u64,
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            slow_participant_warn_ms: DEFAULT_SLOW_PARTICIPANT_MS,
        }
    }
}

impl LifetimeConfig {
    pub fn slow_participant_threshold(&self) -> Option<Duration> {
        (self.slow_participant_warn_ms > 0).then(|| Duration::from_millis(self.slow_participant_warn_ms))
    }
}

/// Main container configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerConfig {
    pub logging: LoggingConfig,
    pub lifetime: LifetimeConfig,
}

/// Partial configuration as read from a TOML file
#[derive(Deserialize, Debug, Default)]
pub struct PartialContainerConfig {
    logging: Option<PartialLoggingConfig>,
    lifetime: Option<PartialLifetimeConfig>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialLoggingConfig {
    level: Option<String>,
    format: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialLifetimeConfig {
    slow_participant_warn_ms: Option<u64>,
}

impl ContainerConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load_config()
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        ConfigLoader::with_path(path).load_config()
    }

    /// Merge a partial file config with environment overrides. Environment wins.
    pub fn from_partial_and_env(
        partial: Option<PartialContainerConfig>,
        env_map: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();
        let logging_file = partial.logging.unwrap_or_default();
        let lifetime_file = partial.lifetime.unwrap_or_default();

        let mut logging = LoggingConfig::default();
        if let Some(level) = env_map.get(ENV_LOG_LEVEL).or(logging_file.level.as_ref()) {
            logging.level = Level::from_str(level.trim()).map_err(|_| ConfigError::InvalidField {
                field: "logging.level".to_string(),
                value: level.clone(),
            })?;
        }
        if let Some(format) = env_map.get(ENV_LOG_FORMAT).or(logging_file.format.as_ref()) {
            logging.format = format.parse::<LogFormat>()?;
        }

        let mut lifetime = LifetimeConfig::default();
        if let Some(ms) = lifetime_file.slow_participant_warn_ms {
            lifetime.slow_participant_warn_ms = ms;
        }
        if let Some(ms) = env_map.get(ENV_SLOW_PARTICIPANT_MS) {
            lifetime.slow_participant_warn_ms = ms.trim().parse().map_err(|_| ConfigError::InvalidField {
                field: "lifetime.slow_participant_warn_ms".to_string(),
                value: ms.clone(),
            })?;
        }

        Ok(Self { logging, lifetime })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = ContainerConfig::from_partial_and_env(None, &HashMap::new()).unwrap();
        assert_eq!(config, ContainerConfig::default());
        assert_eq!(
            config.lifetime.slow_participant_threshold(),
            Some(Duration::from_millis(DEFAULT_SLOW_PARTICIPANT_MS))
        );
    }

    #[test]
    fn test_file_values_are_applied() {
        let partial: PartialContainerConfig = toml::from_str(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [lifetime]
            slow_participant_warn_ms = 0
            "#,
        )
        .unwrap();

        let config = ContainerConfig::from_partial_and_env(Some(partial), &HashMap::new()).unwrap();
        assert_eq!(config.logging.level, Level::DEBUG);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.lifetime.slow_participant_threshold(), None);
    }

    #[test]
    fn test_env_overrides_file() {
        let partial: PartialContainerConfig = toml::from_str(
            r#"
            [logging]
            level = "debug"

            [lifetime]
            slow_participant_warn_ms = 100
            "#,
        )
        .unwrap();
        let env_map = env(&[(ENV_LOG_LEVEL, "warn"), (ENV_SLOW_PARTICIPANT_MS, "250")]);

        let config = ContainerConfig::from_partial_and_env(Some(partial), &env_map).unwrap();
        assert_eq!(config.logging.level, Level::WARN);
        assert_eq!(config.lifetime.slow_participant_warn_ms, 250);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_level = env(&[(ENV_LOG_LEVEL, "loud")]);
        assert!(matches!(
            ContainerConfig::from_partial_and_env(None, &bad_level),
            Err(ConfigError::InvalidField { field, .. }) if field == "logging.level"
        ));

        let bad_ms = env(&[(ENV_SLOW_PARTICIPANT_MS, "soon")]);
        assert!(matches!(
            ContainerConfig::from_partial_and_env(None, &bad_ms),
            Err(ConfigError::InvalidField { field, .. }) if field == "lifetime.slow_participant_warn_ms"
        ));
    }
}
