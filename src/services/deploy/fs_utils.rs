//! 目录与归档工具
//!
//! 递归列举文件、幂等创建/清空目录、解压 tar.gz。
//! 全部是同步 I/O，异步调用方需要放到 `spawn_blocking` 中执行

use flate2::read::GzDecoder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::DeployError;

/// 视为 gzip tar 归档的扩展名
const ARCHIVE_EXTENSIONS: &[&str] = &["gz", "tgz"];

/// 递归列举目录下的所有非目录条目（按文件名排序）
///
/// 根目录不存在或无法遍历时返回 `DeployError::Directory`
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, DeployError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            DeployError::directory(
                format!("Failed to read directory \"{}\"", dir.display()),
                e.into(),
            )
        })?;

        if entry.file_type().is_dir() {
            continue;
        }
        files.push(entry.into_path());
    }

    Ok(files)
}

/// 目录不存在则创建（含父目录）
pub fn ensure_dir(path: &Path) -> Result<(), DeployError> {
    if path.as_os_str().is_empty() {
        return Err(DeployError::InvalidArgument(
            "Directory path cannot be empty".to_string(),
        ));
    }

    if path.is_dir() {
        debug!(path = %path.display(), "Directory already exists");
        return Ok(());
    }

    info!(path = %path.display(), "Directory does not exist, creating");
    fs::create_dir_all(path).map_err(|e| {
        DeployError::directory(
            format!("Failed to create directory \"{}\"", path.display()),
            e,
        )
    })
}

/// 删除目录下的直接内容，保留目录本身
pub fn clear_dir(path: &Path) -> Result<(), DeployError> {
    let entries = fs::read_dir(path).map_err(|e| {
        DeployError::directory(format!("Failed to read directory \"{}\"", path.display()), e)
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            DeployError::directory(format!("Failed to read directory \"{}\"", path.display()), e)
        })?;
        let entry_path = entry.path();
        let file_type = entry.file_type().map_err(|e| {
            DeployError::directory(format!("Failed to stat \"{}\"", entry_path.display()), e)
        })?;

        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&entry_path)
        } else {
            fs::remove_file(&entry_path)
        };
        removed.map_err(|e| {
            DeployError::directory(format!("Failed to remove \"{}\"", entry_path.display()), e)
        })?;
        debug!(path = %entry_path.display(), "Removed stale entry");
    }

    Ok(())
}

/// 是否为 gzip tar 归档
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ARCHIVE_EXTENSIONS.contains(&ext))
}

/// 解压目录下所有 tar.gz 归档
///
/// 每个归档解压到它所在的目录，成功后删除归档本身；非归档文件保持不动。
/// 返回处理过的文件列表（相对 `dir` 的路径）。任何错误都会中止整个目录的处理，
/// 已解压出的文件不做清理
pub fn extract_archives_in_dir(dir: &Path) -> Result<Vec<PathBuf>, DeployError> {
    let files = list_files(dir)?;
    let mut processed = Vec::new();

    for file in files {
        if !is_archive(&file) {
            debug!(file = %file.display(), "Skipping non-archive file");
            processed.push(relative_to(&file, dir));
            continue;
        }

        let target_dir = file.parent().unwrap_or(dir);
        info!(archive = %file.display(), "Extracting archive");

        let extracted = extract_tar_gz(&file, target_dir)?;
        processed.extend(extracted.iter().map(|p| relative_to(p, dir)));

        fs::remove_file(&file).map_err(|e| {
            DeployError::extraction(file.display().to_string(), format!("cannot remove archive: {}", e))
        })?;
        info!(
            archive = %file.display(),
            files = extracted.len(),
            "Archive extracted and removed"
        );
    }

    Ok(processed)
}

/// 解压单个 tar.gz 到 `target_dir`，只物化普通文件
fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, DeployError> {
    let archive_name = archive_path.display().to_string();
    let err = |reason: String| DeployError::extraction(archive_name.clone(), reason);

    let file = fs::File::open(archive_path).map_err(|e| err(format!("cannot open: {}", e)))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut extracted = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| err(format!("cannot read entries: {}", e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| err(format!("corrupt entry: {}", e)))?;
        let entry_path = entry
            .path()
            .map_err(|e| err(format!("invalid entry path: {}", e)))?
            .into_owned();

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            continue;
        }
        if !entry_type.is_file() {
            debug!(entry = %entry_path.display(), ?entry_type, "Skipping non-regular entry");
            continue;
        }
        if !is_safe_entry_path(&entry_path) {
            return Err(err(format!(
                "entry \"{}\" escapes the extraction directory",
                entry_path.display()
            )));
        }

        let target = target_dir.join(&entry_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                err(format!("cannot create \"{}\": {}", parent.display(), e))
            })?;
        }
        entry
            .unpack(&target)
            .map_err(|e| err(format!("cannot write \"{}\": {}", target.display(), e)))?;

        debug!(file = %target.display(), "Extracted file");
        extracted.push(target);
    }

    Ok(extracted)
}

/// 条目路径只能是相对路径且不含 `..`
fn is_safe_entry_path(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    /// 生成测试用 tar.gz
    pub(crate) fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_list_files_excludes_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("x.txt"), "x").unwrap();
        fs::write(root.join("sub/deeper/y.txt"), "y").unwrap();

        let files = list_files(root).unwrap();
        assert_eq!(
            files,
            vec![root.join("sub/deeper/y.txt"), root.join("x.txt")]
        );
    }

    #[test]
    fn test_list_files_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = list_files(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(DeployError::Directory { .. })));
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/c");
        ensure_dir(&path).unwrap();
        ensure_dir(&path).unwrap();
        assert!(path.is_dir());

        assert!(matches!(
            ensure_dir(Path::new("")),
            Err(DeployError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clear_dir_removes_files_and_subdirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("nested/a.txt"), "a").unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();

        clear_dir(root).unwrap();

        assert!(root.is_dir());
        assert_eq!(fs::read_dir(root).unwrap().count(), 0);
    }

    #[test]
    fn test_is_archive() {
        assert!(is_archive(Path::new("site.tar.gz")));
        assert!(is_archive(Path::new("site.tgz")));
        assert!(!is_archive(Path::new("site.zip")));
        assert!(!is_archive(Path::new("README")));
    }

    #[test]
    fn test_extract_nested_entry_and_remove_archive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let archive = root.join("release.tar.gz");
        write_tar_gz(&archive, &[("a/b.txt", b"hello"), ("index.html", b"<html/>")]);

        let processed = extract_archives_in_dir(root).unwrap();

        assert_eq!(fs::read_to_string(root.join("a/b.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(root.join("index.html")).unwrap(), "<html/>");
        assert!(!archive.exists());
        assert!(processed.contains(&PathBuf::from("a/b.txt")));
        assert!(processed.contains(&PathBuf::from("index.html")));
    }

    #[test]
    fn test_extract_into_archive_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        write_tar_gz(&root.join("nested/bundle.tgz"), &[("app.js", b"js")]);

        extract_archives_in_dir(root).unwrap();

        assert!(root.join("nested/app.js").is_file());
        assert!(!root.join("app.js").exists());
    }

    #[test]
    fn test_non_archive_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("notes.txt"), "keep me").unwrap();

        let processed = extract_archives_in_dir(root).unwrap();

        assert_eq!(fs::read_to_string(root.join("notes.txt")).unwrap(), "keep me");
        assert_eq!(processed, vec![PathBuf::from("notes.txt")]);
    }

    #[test]
    fn test_corrupt_archive_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("broken.tar.gz"), b"definitely not gzip").unwrap();

        let result = extract_archives_in_dir(root);
        assert!(matches!(result, Err(DeployError::Extraction { .. })));
        assert!(root.join("broken.tar.gz").exists());
    }

    #[test]
    fn test_entry_escaping_target_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("release");
        fs::create_dir_all(&root).unwrap();

        let file = fs::File::create(root.join("evil.tar.gz")).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let mut header = tar::Header::new_gnu();
        let name = b"../evil.txt";
        header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
        header.set_size(4);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, &b"evil"[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let result = extract_archives_in_dir(&root);
        assert!(matches!(result, Err(DeployError::Extraction { .. })));
        assert!(!temp_dir.path().join("evil.txt").exists());
    }
}
