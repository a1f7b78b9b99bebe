//! 配置模块
//!
//! 环境变量解析与仓库配置加载

pub mod env;
pub mod repository;

pub use env::{ConfigError, EnvConfig};
pub use repository::{RepositoryConfig, RepositoryTarget};
