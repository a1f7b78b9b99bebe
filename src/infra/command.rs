//! 命令执行器
//!
//! 提供统一的命令执行接口：
//! - 超时控制（超时后进程被 kill）
//! - stdout/stderr 合并为一段输出，用于错误信息

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

/// 命令执行错误
#[derive(Debug)]
pub enum CommandError {
    /// 命令启动失败（程序不存在、无权限）
    SpawnFailed(std::io::Error),
    /// 命令超时
    Timeout(Duration),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::SpawnFailed(e) => write!(f, "Failed to spawn command: {}", e),
            CommandError::Timeout(d) => write!(f, "Command timed out after {:?}", d),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::SpawnFailed(e) => Some(e),
            CommandError::Timeout(_) => None,
        }
    }
}

/// 命令执行结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    /// 退出码为 0
    pub success: bool,
    /// 被信号终止时为 None
    pub exit_code: Option<i32>,
    /// stdout 后接 stderr
    pub combined: String,
}

impl CommandOutput {
    pub fn success(combined: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            combined: combined.into(),
        }
    }

    pub fn failure(exit_code: i32, combined: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            combined: combined.into(),
        }
    }
}

/// 外部命令执行能力
///
/// 重载阶段通过它调用 systemctl / pm2，测试中替换为记录调用的实现
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;
}

/// 直接在本机执行命令
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        debug!(program = %program, args = ?args, "Running command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            result = child => result.map_err(CommandError::SpawnFailed)?,
            _ = tokio::time::sleep(timeout) => {
                error!(program = %program, "Command timed out after {:?}", timeout);
                return Err(CommandError::Timeout(timeout));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let output = SystemCommandExecutor
            .run("echo", &["hello"], Duration::from_secs(5))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert!(output.combined.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_not_found() {
        let result = SystemCommandExecutor
            .run("nonexistent_command_12345", &[], Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(CommandError::SpawnFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_combines_stdout_and_stderr() {
        let output = SystemCommandExecutor
            .run(
                "sh",
                &["-c", "echo out; echo err >&2; exit 3"],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert!(output.combined.contains("out"));
        assert!(output.combined.contains("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout() {
        let result = SystemCommandExecutor
            .run("sleep", &["5"], Duration::from_millis(100))
            .await;

        assert!(matches!(result, Err(CommandError::Timeout(_))));
    }
}
