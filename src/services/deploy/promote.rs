//! 站点内容替换
//!
//! 让站点目录的文件集合与 release 目录一致，所有文件都是 release 文件的硬链接，
//! 因此 release 与 site 必须位于同一文件系统。
//!
//! 优先走目录替换：在站点目录旁边构建一个兄弟目录，再通过 rename 换入；
//! 条件不满足（跨设备、挂载点、权限、站点目录是符号链接）时退回原地清空再链接，
//! 后者不是原子的，中途失败会让站点目录处于混合或空状态

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DeployError;

use super::fs_utils::{ensure_dir, list_files};

/// 实际使用的替换方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromotionMethod {
    /// 兄弟目录 + rename
    Swap,
    /// 原地清空再链接
    InPlace,
}

/// 替换结果
#[derive(Debug)]
pub struct PromotionReport {
    pub method: PromotionMethod,
    /// 已链接的文件（相对站点目录）
    pub files: Vec<PathBuf>,
}

/// 替换站点内容
///
/// 站点目录不存在时先创建
pub fn promote(release_dir: &Path, site_dir: &Path) -> Result<PromotionReport, DeployError> {
    ensure_dir(site_dir)?;

    let sources = list_files(release_dir)?;

    match try_swap(release_dir, &sources, site_dir) {
        Ok(files) => {
            info!(
                release = %release_dir.display(),
                site = %site_dir.display(),
                files = files.len(),
                "Site directory swapped"
            );
            Ok(PromotionReport {
                method: PromotionMethod::Swap,
                files,
            })
        }
        Err(SwapError::Unavailable(reason)) => {
            warn!(
                site = %site_dir.display(),
                reason = %reason,
                "Directory swap unavailable, falling back to non-atomic in-place promotion"
            );
            let files = link_release_to_site(release_dir, site_dir)?;
            Ok(PromotionReport {
                method: PromotionMethod::InPlace,
                files,
            })
        }
        Err(SwapError::Failed(err)) => Err(err),
    }
}

/// 原地替换：删除站点目录中的所有文件，再把 release 文件逐个硬链接过去
///
/// 删除或链接失败立即返回，不重试也不恢复已删除的文件
pub fn link_release_to_site(release_dir: &Path, site_dir: &Path) -> Result<Vec<PathBuf>, DeployError> {
    let sources = list_files(release_dir)?;
    debug!(release = %release_dir.display(), files = sources.len(), "Found files in release directory");

    let existing = list_files(site_dir)?;
    debug!(site = %site_dir.display(), files = existing.len(), "Found files in site directory");

    for file in &existing {
        fs::remove_file(file).map_err(|e| {
            DeployError::directory(
                format!("Failed to remove \"{}\" from site directory", file.display()),
                e,
            )
        })?;
    }
    info!(site = %site_dir.display(), removed = existing.len(), "Cleared site directory");

    link_tree(release_dir, &sources, site_dir)
}

/// 把 `sources` 按相对 `release_dir` 的路径硬链接到 `dest_root` 下
fn link_tree(
    release_dir: &Path,
    sources: &[PathBuf],
    dest_root: &Path,
) -> Result<Vec<PathBuf>, DeployError> {
    let mut linked = Vec::with_capacity(sources.len());

    for source in sources {
        let relative = source.strip_prefix(release_dir).map_err(|_| {
            DeployError::InvalidArgument(format!(
                "\"{}\" is not inside \"{}\"",
                source.display(),
                release_dir.display()
            ))
        })?;
        let target = dest_root.join(relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DeployError::directory(
                    format!("Failed to create parent directory \"{}\"", parent.display()),
                    e,
                )
            })?;
        }

        fs::hard_link(source, &target).map_err(|e| {
            DeployError::directory(
                format!(
                    "Failed to link \"{}\" to \"{}\"",
                    source.display(),
                    target.display()
                ),
                e,
            )
        })?;

        debug!(file = %relative.display(), "File linked");
        linked.push(relative.to_path_buf());
    }

    Ok(linked)
}

enum SwapError {
    /// 无法换入，站点目录未被改动，可以退回原地替换
    Unavailable(DeployError),
    /// 站点目录已被移走且换入失败
    Failed(DeployError),
}

fn try_swap(
    release_dir: &Path,
    sources: &[PathBuf],
    site_dir: &Path,
) -> Result<Vec<PathBuf>, SwapError> {
    let unavailable = |msg: String| {
        SwapError::Unavailable(DeployError::directory(
            msg,
            std::io::Error::new(std::io::ErrorKind::Unsupported, "swap unavailable"),
        ))
    };

    let metadata = fs::symlink_metadata(site_dir).map_err(|e| {
        SwapError::Unavailable(DeployError::directory(
            format!("Failed to stat \"{}\"", site_dir.display()),
            e,
        ))
    })?;
    if metadata.file_type().is_symlink() {
        return Err(unavailable(format!("\"{}\" is a symlink", site_dir.display())));
    }

    let (Some(parent), Some(name)) = (site_dir.parent(), site_dir.file_name()) else {
        return Err(unavailable(format!("\"{}\" has no parent directory", site_dir.display())));
    };
    let name = name.to_string_lossy();
    let suffix = Uuid::new_v4().simple().to_string();
    let incoming = parent.join(format!(".{}.incoming-{}", name, suffix));
    let retired = parent.join(format!(".{}.retired-{}", name, suffix));

    fs::create_dir(&incoming).map_err(|e| {
        SwapError::Unavailable(DeployError::directory(
            format!("Failed to create \"{}\"", incoming.display()),
            e,
        ))
    })?;

    let built = fs::set_permissions(&incoming, metadata.permissions())
        .map_err(|e| {
            DeployError::directory(format!("Failed to set permissions on \"{}\"", incoming.display()), e)
        })
        .and_then(|_| link_tree(release_dir, sources, &incoming));
    let files = match built {
        Ok(files) => files,
        Err(err) => {
            discard(&incoming);
            return Err(SwapError::Unavailable(err));
        }
    };

    if let Err(e) = fs::rename(site_dir, &retired) {
        discard(&incoming);
        return Err(SwapError::Unavailable(DeployError::directory(
            format!("Failed to move \"{}\" aside", site_dir.display()),
            e,
        )));
    }

    if let Err(e) = fs::rename(&incoming, site_dir) {
        if let Err(restore) = fs::rename(&retired, site_dir) {
            warn!(
                site = %site_dir.display(),
                retired = %retired.display(),
                error = %restore,
                "Failed to restore previous site directory"
            );
        }
        discard(&incoming);
        return Err(SwapError::Failed(DeployError::directory(
            format!("Failed to move new content into \"{}\"", site_dir.display()),
            e,
        )));
    }

    discard(&retired);
    Ok(files)
}

/// 删除临时目录，失败只记录日志
fn discard(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        warn!(path = %dir.display(), error = %e, "Failed to remove temporary directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let release = temp_dir.path().join("release");
        let site = temp_dir.path().join("www/site");
        fs::create_dir_all(release.join("sub")).unwrap();
        fs::write(release.join("x.txt"), "xx").unwrap();
        fs::write(release.join("sub/y.txt"), "yyyy").unwrap();
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("old.txt"), "old").unwrap();
        (temp_dir, release, site)
    }

    fn relative_files(root: &Path) -> Vec<PathBuf> {
        list_files(root)
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect()
    }

    #[cfg(unix)]
    fn same_inode(a: &Path, b: &Path) -> bool {
        use std::os::unix::fs::MetadataExt;
        fs::metadata(a).unwrap().ino() == fs::metadata(b).unwrap().ino()
    }

    #[test]
    fn test_in_place_replaces_site_content() {
        let (_temp_dir, release, site) = setup();

        let linked = link_release_to_site(&release, &site).unwrap();

        assert_eq!(linked.len(), 2);
        assert_eq!(
            relative_files(&site),
            vec![PathBuf::from("sub/y.txt"), PathBuf::from("x.txt")]
        );
        assert!(!site.join("old.txt").exists());
        for name in ["x.txt", "sub/y.txt"] {
            assert_eq!(
                fs::metadata(site.join(name)).unwrap().len(),
                fs::metadata(release.join(name)).unwrap().len()
            );
            #[cfg(unix)]
            assert!(same_inode(&site.join(name), &release.join(name)));
        }
    }

    #[test]
    fn test_promote_swaps_directory() {
        let (temp_dir, release, site) = setup();

        let report = promote(&release, &site).unwrap();

        assert_eq!(report.method, PromotionMethod::Swap);
        assert_eq!(
            relative_files(&site),
            vec![PathBuf::from("sub/y.txt"), PathBuf::from("x.txt")]
        );
        #[cfg(unix)]
        assert!(same_inode(&site.join("x.txt"), &release.join("x.txt")));

        // 不留下临时目录
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path().join("www"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("site")]);
    }

    #[test]
    fn test_promote_creates_missing_site_dir() {
        let (temp_dir, release, _site) = setup();
        let fresh = temp_dir.path().join("fresh/site");

        let report = promote(&release, &fresh).unwrap();

        assert_eq!(report.files.len(), 2);
        assert!(fresh.join("sub/y.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_site_falls_back_to_in_place() {
        let (temp_dir, release, site) = setup();
        let link = temp_dir.path().join("current");
        std::os::unix::fs::symlink(&site, &link).unwrap();

        let report = promote(&release, &link).unwrap();

        assert_eq!(report.method, PromotionMethod::InPlace);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(site.join("x.txt").is_file());
        assert!(!site.join("old.txt").exists());
    }

    #[test]
    fn test_missing_release_dir_fails_before_touching_site() {
        let (temp_dir, _release, site) = setup();

        let result = link_release_to_site(&temp_dir.path().join("nope"), &site);

        assert!(matches!(result, Err(DeployError::Directory { .. })));
        assert!(site.join("old.txt").exists());
    }
}
