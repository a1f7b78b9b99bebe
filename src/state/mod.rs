//! 运行时状态模块
//!
//! 管理应用状态、任务存储和仓库部署锁

pub mod app_state;
pub mod deploy_locks;
pub mod task_store;

pub use app_state::AppState;
pub use deploy_locks::DeployLocks;
pub use task_store::TaskStore;
