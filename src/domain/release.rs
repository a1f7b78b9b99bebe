//! Release 事件领域模型
//!
//! GitHub release webhook payload 中流水线实际用到的字段，以及解析后的不可变事件

use serde::Deserialize;

/// 唯一触发部署的 release 动作
pub const RELEASED_ACTION: &str = "released";

/// Release 事件动作
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseAction {
    /// 正式发布，触发部署
    Released,
    /// 其他动作（published / created / edited ...），不处理
    Other(String),
}

impl ReleaseAction {
    pub fn parse(action: &str) -> Self {
        if action == RELEASED_ACTION {
            ReleaseAction::Released
        } else {
            ReleaseAction::Other(action.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReleaseAction::Released => RELEASED_ACTION,
            ReleaseAction::Other(action) => action,
        }
    }

    /// 是否需要执行部署
    pub fn triggers_deploy(&self) -> bool {
        matches!(self, ReleaseAction::Released)
    }
}

/// Release 附件
///
/// `name` 作为落盘文件名，`url` 为 API 下载地址（需要 octet-stream Accept 头）
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    pub url: String,
}

impl Asset {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// 解析后的 release 事件，每个请求构造一次，不持久化
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub owner: String,
    pub repo: String,
    pub tag: String,
    pub action: ReleaseAction,
    pub assets: Vec<Asset>,
}

impl ReleaseEvent {
    /// 从 webhook 原始 JSON 解析
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let payload: ReleaseEventPayload = serde_json::from_slice(payload)?;
        Ok(payload.into())
    }

    /// `owner/repo`，用作部署锁和日志的键
    pub fn repo_key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// GitHub `release` 事件 payload（只保留用到的字段）
#[derive(Debug, Deserialize)]
struct ReleaseEventPayload {
    action: String,
    release: ReleasePayload,
    repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
struct ReleasePayload {
    tag_name: String,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name: String,
    owner: OwnerPayload,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
}

impl From<ReleaseEventPayload> for ReleaseEvent {
    fn from(payload: ReleaseEventPayload) -> Self {
        Self {
            owner: payload.repository.owner.login,
            repo: payload.repository.name,
            tag: payload.release.tag_name,
            action: ReleaseAction::parse(&payload.action),
            assets: payload.release.assets,
        }
    }
}
