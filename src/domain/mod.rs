//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod deploy;
pub mod release;

pub use deploy::{DeployStage, DeployStatus, DeployTask, PipelineState, StageStatus};
pub use release::{Asset, ReleaseAction, ReleaseEvent};
