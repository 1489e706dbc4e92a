//! Service registry
//!
//! Type-keyed registry holding eager instances, lazy factories and
//! interface aliases, plus the constructor resolver built on top of it.

mod declarations;
mod registry;
mod resolver;

pub use declarations::{Component, Declarations};
pub use registry::{RegistryStats, ServiceRegistry};
pub use resolver::{Arguments, Constructor, FactoryMethod, Injectable, Overrides, Parameter, Signature};
