//! Release 附件下载
//!
//! 按顺序逐个下载到暂存目录；任意一个失败即中止整批，不允许只带部分附件继续部署

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::release::Asset;
use crate::error::DeployError;
use crate::infra::AssetDownloader;

use super::staging::validate_component;

/// 下载结果
#[derive(Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// 全部下载成功，按附件顺序返回落盘路径
    Downloaded(Vec<PathBuf>),
    /// release 没有附件，没有可部署内容
    NoAssetsFound,
}

/// 下载所有附件到 `dest_dir/<asset.name>`
pub async fn download_assets(
    downloader: &dyn AssetDownloader,
    assets: &[Asset],
    dest_dir: &Path,
) -> Result<DownloadOutcome, DeployError> {
    if assets.is_empty() {
        return Ok(DownloadOutcome::NoAssetsFound);
    }

    validate_assets(assets)?;

    let mut paths = Vec::with_capacity(assets.len());
    for asset in assets {
        let output = dest_dir.join(&asset.name);
        downloader.download_asset(asset, &output).await?;
        paths.push(output);
    }

    info!(
        dest = %dest_dir.display(),
        count = paths.len(),
        "All assets downloaded"
    );
    Ok(DownloadOutcome::Downloaded(paths))
}

/// 附件名必须是合法文件名且在同一 release 内唯一
///
/// 同名附件会互相覆盖，结果取决于下载顺序，直接拒绝
pub(crate) fn validate_assets(assets: &[Asset]) -> Result<(), DeployError> {
    let mut seen = HashSet::with_capacity(assets.len());
    for asset in assets {
        validate_component("asset name", &asset.name)?;
        if asset.url.is_empty() {
            return Err(DeployError::InvalidArgument(format!(
                "asset \"{}\" has no download URL",
                asset.name
            )));
        }
        if !seen.insert(asset.name.as_str()) {
            return Err(DeployError::InvalidArgument(format!(
                "duplicate asset name \"{}\"",
                asset.name
            )));
        }
    }
    Ok(())
}
