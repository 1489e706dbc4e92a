//! 基础设施层
//!
//! 提供服务注册表与生命周期管理：
//! - 类型索引的服务容器
//! - 构造函数解析
//! - 客户端与登录生命周期

// 容器实现
pub mod container;
// 生命周期管理
pub mod lifetime;

// 重新导出API
pub use container::{Component, Declarations, Injectable, Overrides, ServiceRegistry};
pub use lifetime::{ClientLifetime, LifetimeManager, LogonLifetime, Progress};
