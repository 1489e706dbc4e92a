//! Ordered component lifecycles.
//!
//! Two families are driven in registration order:
//! - client: `run_client_startup` / `run_client_shutdown`
//! - logon: `run_logon` / `run_logoff`

pub mod capability;
pub mod manager;

pub use capability::{ClientLifetime, LogonLifetime, Progress};
pub use manager::LifetimeManager;
