//! 基础设施模块
//!
//! 封装外部依赖（GitHub 附件下载、通知 webhook、命令执行）

pub mod command;
pub mod github;
pub mod notification;

pub use command::{CommandError, CommandExecutor, CommandOutput, SystemCommandExecutor};
pub use github::{AssetDownloader, GithubAssetClient};
pub use notification::{Notifier, WebhookNotifier};
