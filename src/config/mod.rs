pub mod app_config;
pub mod loader;

// Re-export commonly used types
pub use app_config::{ContainerConfig, LifetimeConfig};
pub use loader::ConfigLoader;

// Re-export constants
pub use app_config::{
    DEFAULT_SLOW_PARTICIPANT_MS, ENV_CONFIG_PATH, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_SLOW_PARTICIPANT_MS,
};
