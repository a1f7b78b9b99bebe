//! 服务重载
//!
//! 新内容换入站点目录后，按仓库配置的目标类型通知依赖服务重新加载：
//! - `nginx`: `systemctl reload nginx`
//! - `pm2`: `pm2 reload <process>`

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::DeployError;
use crate::infra::{CommandError, CommandExecutor};

/// 目标类型标识（仓库配置中的 `targetType`）
pub const TARGET_NGINX: &str = "nginx";
pub const TARGET_PM2: &str = "pm2";

/// 重载方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadStrategy {
    Nginx,
    Pm2 { process: String },
}

impl ReloadStrategy {
    /// 根据目标类型和进程名解析重载方式
    ///
    /// 未知类型返回 `UnsupportedTargetType`，pm2 缺少进程名属于仓库配置错误，返回 `Configuration`
    pub fn for_target(target_type: &str, process_name: Option<&str>) -> Result<Self, DeployError> {
        match target_type {
            TARGET_NGINX => Ok(ReloadStrategy::Nginx),
            TARGET_PM2 => match process_name.filter(|name| !name.is_empty()) {
                Some(process) => Ok(ReloadStrategy::Pm2 {
                    process: process.to_string(),
                }),
                None => Err(DeployError::Configuration(
                    "pm2 target requires a process name".to_string(),
                )),
            },
            other => Err(DeployError::UnsupportedTargetType(other.to_string())),
        }
    }

    /// 要执行的命令和参数
    pub fn command(&self) -> (&'static str, Vec<&str>) {
        match self {
            ReloadStrategy::Nginx => ("systemctl", vec!["reload", "nginx"]),
            ReloadStrategy::Pm2 { process } => ("pm2", vec!["reload", process.as_str()]),
        }
    }

    /// 日志和错误信息里使用的目标描述
    pub fn target(&self) -> String {
        match self {
            ReloadStrategy::Nginx => TARGET_NGINX.to_string(),
            ReloadStrategy::Pm2 { process } => format!("{} process \"{}\"", TARGET_PM2, process),
        }
    }
}

/// 重载调度器
#[derive(Clone)]
pub struct ReloadDispatcher {
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

impl ReloadDispatcher {
    pub fn new(executor: Arc<dyn CommandExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    /// 解析目标类型并执行对应的重载命令
    ///
    /// 目标类型不合法时不会执行任何命令
    pub async fn reload(
        &self,
        target_type: &str,
        process_name: Option<&str>,
    ) -> Result<ReloadStrategy, DeployError> {
        let strategy = ReloadStrategy::for_target(target_type, process_name)?;
        self.run(&strategy).await?;
        Ok(strategy)
    }

    async fn run(&self, strategy: &ReloadStrategy) -> Result<(), DeployError> {
        let (program, args) = strategy.command();
        let target = strategy.target();
        info!(target = %target, program = %program, args = ?args, "Reloading service");

        let output = self
            .executor
            .run(program, &args, self.timeout)
            .await
            .map_err(|e| {
                error!(target = %target, error = %e, "Reload command could not run");
                let output = match e {
                    CommandError::SpawnFailed(err) => err.to_string(),
                    timeout @ CommandError::Timeout(_) => timeout.to_string(),
                };
                DeployError::Reload {
                    target: target.clone(),
                    output,
                }
            })?;

        if !output.success {
            error!(
                target = %target,
                exit_code = ?output.exit_code,
                output = %output.combined,
                "Reload command failed"
            );
            return Err(DeployError::Reload {
                target,
                output: output.combined,
            });
        }

        info!(target = %target, "Service reloaded");
        Ok(())
    }
}
