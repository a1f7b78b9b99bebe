//! Release 部署流水线
//!
//! 暂存 → 下载 → 解压 → 换入站点目录 → 重载服务 → 通知。
//! 任一阶段失败立即终止，不回滚已完成的阶段；通知失败只记录日志

pub mod context;
pub mod download;
pub mod fs_utils;
pub mod promote;
pub mod staging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::deploy::{DeployStatus, PipelineState};
use crate::domain::release::ReleaseEvent;
use crate::error::DeployError;
use crate::state::AppState;

pub use context::DeployContext;
pub use download::{download_assets, DownloadOutcome};
pub use promote::{promote, PromotionMethod, PromotionReport};
pub use staging::prepare_release_dir;

/// 阶段标识，与 `pipeline_stages()` 一致
pub mod stage {
    pub const STAGE: &str = "stage";
    pub const DOWNLOAD: &str = "download";
    pub const EXTRACT: &str = "extract";
    pub const PROMOTE: &str = "promote";
    pub const RELOAD: &str = "reload";
    pub const NOTIFY: &str = "notify";
}

/// 部署结果
#[derive(Debug)]
pub enum DeployOutcome {
    /// 新内容已换入并重载
    Deployed {
        task_id: String,
        /// 相对暂存目录的文件列表
        files: Vec<PathBuf>,
    },
    /// release 没有附件，未做任何部署
    Skipped { task_id: String, tag: String },
}

/// 校验 release 能否安全映射到磁盘路径，不做任何文件操作
///
/// owner、repo 必须是单个目录名；tag 可以带 `/`；附件名唯一且不含路径分隔符
pub fn validate_release(event: &ReleaseEvent) -> Result<(), DeployError> {
    staging::validate_component("owner", &event.owner)?;
    staging::validate_component("repo", &event.repo)?;
    staging::validate_tag(&event.tag)?;
    download::validate_assets(&event.assets)
}

/// 执行一次 release 部署
///
/// 同一仓库的部署串行执行；锁在整个流水线期间持有，结束后释放
pub async fn execute(
    state: Arc<AppState>,
    event: &ReleaseEvent,
) -> Result<DeployOutcome, DeployError> {
    validate_release(event)?;

    let repo_key = event.repo_key();
    if state.deploy_locks.is_locked(&repo_key).await {
        info!(repository = %repo_key, tag = %event.tag, "Waiting for in-flight deployment of the same repository");
    }
    let guard = state.deploy_locks.acquire(&repo_key).await;
    let result = execute_locked(&state, event, &repo_key).await;
    state.deploy_locks.release(&repo_key, guard).await;
    result
}

async fn execute_locked(
    state: &Arc<AppState>,
    event: &ReleaseEvent,
    repo_key: &str,
) -> Result<DeployOutcome, DeployError> {
    let mut ctx = DeployContext::create(state.clone(), event).await;
    let task_id = ctx.task_id.clone();

    info!(
        task_id = %task_id,
        owner = %event.owner,
        repo = %event.repo,
        tag = %event.tag,
        assets = event.assets.len(),
        "Starting release deployment"
    );

    let result = run_pipeline(state, event, &mut ctx).await;

    match &result {
        Ok(DeployOutcome::Deployed { files, .. }) => {
            info!(
                task_id = %task_id,
                repository = %repo_key,
                tag = %event.tag,
                files = files.len(),
                "Release deployed"
            );
            ctx.finish(DeployStatus::Success, None).await;
        }
        Ok(DeployOutcome::Skipped { .. }) => {
            info!(
                task_id = %task_id,
                repository = %repo_key,
                tag = %event.tag,
                "No assets found for release, skipping"
            );
            ctx.finish(DeployStatus::Skipped, None).await;
        }
        Err(err) => {
            error!(
                task_id = %task_id,
                repository = %repo_key,
                tag = %event.tag,
                stage = %ctx.pipeline_state().as_str(),
                kind = %err.kind(),
                error = %err,
                "Release deployment failed"
            );
            ctx.finish(DeployStatus::Failed, Some(err.to_string())).await;
        }
    }

    result
}

async fn run_pipeline(
    state: &AppState,
    event: &ReleaseEvent,
    ctx: &mut DeployContext,
) -> Result<DeployOutcome, DeployError> {
    // Stage 1: 暂存目录
    ctx.start_stage(stage::STAGE).await;
    let prepared = {
        let assets_root = state.config.assets_dir.clone();
        let (owner, repo, tag) = (event.owner.clone(), event.repo.clone(), event.tag.clone());
        blocking(move || prepare_release_dir(&assets_root, &owner, &repo, &tag)).await
    };
    let release_dir = ctx.track(stage::STAGE, PipelineState::Staged, prepared).await?;

    // Stage 2: 下载附件
    ctx.start_stage(stage::DOWNLOAD).await;
    let downloaded = download_assets(state.downloader.as_ref(), &event.assets, &release_dir).await;
    match ctx.track(stage::DOWNLOAD, PipelineState::Downloaded, downloaded).await? {
        DownloadOutcome::Downloaded(_) => {}
        DownloadOutcome::NoAssetsFound => {
            ctx.skip_pending("No assets found");
            ctx.finish_stage(stage::DOWNLOAD, true, Some("No assets found".to_string()))
                .await;
            return Ok(DeployOutcome::Skipped {
                task_id: ctx.task_id.clone(),
                tag: event.tag.clone(),
            });
        }
    }

    // Stage 3: 解压
    ctx.start_stage(stage::EXTRACT).await;
    let extracted = {
        let dir = release_dir.clone();
        blocking(move || fs_utils::extract_archives_in_dir(&dir)).await
    };
    let files = ctx.track(stage::EXTRACT, PipelineState::Extracted, extracted).await?;

    // Stage 4: 换入站点目录
    ctx.start_stage(stage::PROMOTE).await;
    let promoted = match resolve_site_dir(state, event) {
        Ok(site_dir) => {
            let release = release_dir.clone();
            blocking(move || promote(&release, &site_dir)).await
        }
        Err(err) => Err(err),
    };
    let report = ctx.track(stage::PROMOTE, PipelineState::Promoted, promoted).await?;
    if report.method == PromotionMethod::InPlace {
        warn!(task_id = %ctx.task_id, "Site content was replaced in place");
    }

    // Stage 5: 重载服务
    ctx.start_stage(stage::RELOAD).await;
    let reloaded = match state.get_repository(&event.repo, &event.owner) {
        Some(target) => {
            state
                .reloader
                .reload(&target.target_type, target.target_process_name.as_deref())
                .await
        }
        None => Err(repository_not_found(event)),
    };
    ctx.track(stage::RELOAD, PipelineState::Reloaded, reloaded).await?;

    // Stage 6: 通知（失败不影响结果）
    ctx.start_stage(stage::NOTIFY).await;
    let message = deployment_message(&event.repo, &event.tag, &files);
    match state.notifier.notify(&message).await {
        Ok(()) => ctx.finish_stage(stage::NOTIFY, true, None).await,
        Err(err) => {
            warn!(task_id = %ctx.task_id, error = %err, "Failed to send notification");
            ctx.finish_stage(stage::NOTIFY, false, Some(err.to_string()))
                .await;
        }
    }
    ctx.advance().await;

    Ok(DeployOutcome::Deployed {
        task_id: ctx.task_id.clone(),
        files,
    })
}

/// 查找仓库的站点目录
fn resolve_site_dir(state: &AppState, event: &ReleaseEvent) -> Result<PathBuf, DeployError> {
    let target = state
        .get_repository(&event.repo, &event.owner)
        .ok_or_else(|| repository_not_found(event))?;

    target.site_dir().ok_or_else(|| {
        DeployError::Configuration(format!(
            "Site directory not found for repository: {}",
            event.repo_key()
        ))
    })
}

fn repository_not_found(event: &ReleaseEvent) -> DeployError {
    DeployError::Configuration(format!(
        "Repository not found in config: {}",
        event.repo_key()
    ))
}

/// 部署成功的通知内容
pub fn deployment_message(repo: &str, tag: &str, files: &[PathBuf]) -> String {
    let files: Vec<String> = files.iter().map(|f| display_path(f)).collect();
    format!(
        "New release deployed for: `repo:{}` `tag:{}`\n\nFiles:\n```\n- {}\n```",
        repo,
        tag,
        files.join("\n- ")
    )
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// 在阻塞线程池中执行文件系统操作
async fn blocking<T, F>(f: F) -> Result<T, DeployError>
where
    F: FnOnce() -> Result<T, DeployError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        DeployError::directory(
            "Filesystem task did not complete",
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        )
    })?
}
