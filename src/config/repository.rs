//! 仓库配置
//!
//! 从 JSON 文件加载每个仓库的部署目标：站点目录和重载方式

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::env::ConfigError;

/// 单个仓库的部署目标
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryTarget {
    pub name: String,
    pub owner: String,
    /// 附件来源，目前只有 `github`
    #[serde(default)]
    pub source_type: String,
    /// 站点目录（由 nginx / pm2 对外提供服务）
    #[serde(default)]
    pub target_dir: String,
    /// `nginx` 或 `pm2`
    #[serde(default)]
    pub target_type: String,
    /// pm2 进程名
    #[serde(default)]
    pub target_process_name: Option<String>,
}

impl RepositoryTarget {
    /// 站点目录，未设置时为 None
    pub fn site_dir(&self) -> Option<PathBuf> {
        if self.target_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.target_dir))
        }
    }
}

/// 仓库配置文件
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub repositories: Vec<RepositoryTarget>,
}

impl RepositoryConfig {
    /// 从文件加载
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// 按仓库名和 owner 查找
    pub fn find(&self, name: &str, owner: &str) -> Option<&RepositoryTarget> {
        self.repositories
            .iter()
            .find(|repo| repo.name == name && repo.owner == owner)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
