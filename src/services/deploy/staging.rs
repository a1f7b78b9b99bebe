//! Release 暂存目录
//!
//! 每个 (owner, repo, tag) 对应 `assets_root/owner/repo/tag`，
//! 带 `/` 的 tag（如 `frontend/v1.2.0`）按层级嵌套。
//! 部署结束后目录保留在磁盘上，作为已部署内容的存档

use std::path::{Component, Path, PathBuf};
use tracing::info;

use crate::error::DeployError;

use super::fs_utils::{clear_dir, ensure_dir};

/// 准备 release 暂存目录
///
/// 目录不存在则创建；已存在则清空其内容，避免重复投递同一 tag 时残留上一次（可能失败的）文件
pub fn prepare_release_dir(
    assets_root: &Path,
    owner: &str,
    repo: &str,
    tag: &str,
) -> Result<PathBuf, DeployError> {
    if assets_root.as_os_str().is_empty() {
        return Err(DeployError::Configuration(
            "Assets directory cannot be empty".to_string(),
        ));
    }
    validate_component("owner", owner)?;
    validate_component("repo", repo)?;
    validate_tag(tag)?;

    let release_dir = assets_root.join(owner).join(repo).join(tag);

    if release_dir.is_dir() {
        info!(path = %release_dir.display(), "Release directory exists, clearing previous content");
        clear_dir(&release_dir)?;
    } else {
        ensure_dir(&release_dir)?;
    }

    Ok(release_dir)
}

/// 路径片段必须非空，且只能是单个普通目录名
pub(crate) fn validate_component(label: &str, value: &str) -> Result<(), DeployError> {
    if value.is_empty() {
        return Err(DeployError::InvalidArgument(format!("{} cannot be empty", label)));
    }
    let mut components = Path::new(value).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || value.contains('/') || value.contains('\\') {
        return Err(DeployError::InvalidArgument(format!(
            "{} must be a single path component, got \"{}\"",
            label, value
        )));
    }
    Ok(())
}

/// tag 按 `/` 分段，每一段都必须是普通目录名
pub(crate) fn validate_tag(tag: &str) -> Result<(), DeployError> {
    if tag.is_empty() {
        return Err(DeployError::InvalidArgument("tag cannot be empty".to_string()));
    }
    for segment in tag.split('/') {
        validate_component("tag segment", segment).map_err(|_| {
            DeployError::InvalidArgument(format!(
                "tag \"{}\" must be a relative path of plain directory names",
                tag
            ))
        })?;
    }
    Ok(())
}
