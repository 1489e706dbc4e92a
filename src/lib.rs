pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::ContainerConfig;
pub use errors::{ConfigError, ContainerError};
pub use infrastructure::container::{
    Arguments, Component, Constructor, Declarations, FactoryMethod, Injectable, Overrides, Parameter,
    RegistryStats, ServiceRegistry, Signature,
};
pub use infrastructure::lifetime::{ClientLifetime, LifetimeManager, LogonLifetime, Progress};
