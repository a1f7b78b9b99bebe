//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{EnvConfig, RepositoryConfig, RepositoryTarget};
use crate::infra::{
    AssetDownloader, CommandExecutor, GithubAssetClient, Notifier, SystemCommandExecutor,
    WebhookNotifier,
};
use crate::services::reload::ReloadDispatcher;

use super::deploy_locks::DeployLocks;
use super::task_store::TaskStore;

/// 应用状态
pub struct AppState {
    // ========== 核心配置 ==========
    /// 环境配置
    pub config: EnvConfig,
    /// 仓库配置
    pub repositories: RepositoryConfig,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,

    // ========== 任务管理 ==========
    /// 任务存储
    pub task_store: TaskStore,
    /// 每个仓库的部署锁
    pub deploy_locks: DeployLocks,

    // ========== 外部服务 ==========
    /// 附件下载
    pub downloader: Arc<dyn AssetDownloader>,
    /// 部署通知
    pub notifier: Arc<dyn Notifier>,
    /// 服务重载
    pub reloader: ReloadDispatcher,
}

impl AppState {
    /// 使用生产环境的外部服务创建应用状态
    pub fn new(config: EnvConfig, repositories: RepositoryConfig) -> Result<Self, reqwest::Error> {
        let downloader = GithubAssetClient::new(config.github_token.clone(), config.download_timeout)?;
        let notifier = WebhookNotifier::new(config.notification_webhook_url.clone())?;

        tracing::info!(
            port = config.port,
            assets_dir = %config.assets_dir.display(),
            dev_mode = config.dev_mode,
            notifications = notifier.is_enabled(),
            repository_count = repositories.len(),
            "Loaded configuration"
        );

        for repo in &repositories.repositories {
            let repository = format!("{}/{}", repo.owner, repo.name);
            tracing::info!(
                repository = %repository,
                target_dir = %repo.target_dir,
                target_type = %repo.target_type,
                "Registered repository"
            );
        }

        Ok(Self::with_collaborators(
            config,
            repositories,
            Arc::new(downloader),
            Arc::new(notifier),
            Arc::new(SystemCommandExecutor),
        ))
    }

    /// 使用指定的外部服务创建应用状态
    pub fn with_collaborators(
        config: EnvConfig,
        repositories: RepositoryConfig,
        downloader: Arc<dyn AssetDownloader>,
        notifier: Arc<dyn Notifier>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let reloader = ReloadDispatcher::new(executor, config.reload_timeout);

        Self {
            config,
            repositories,
            started_at: Utc::now(),

            task_store: TaskStore::new(),
            deploy_locks: DeployLocks::new(),

            downloader,
            notifier,
            reloader,
        }
    }

    /// 获取仓库配置
    pub fn get_repository(&self, name: &str, owner: &str) -> Option<&RepositoryTarget> {
        self.repositories.find(name, owner)
    }
}
