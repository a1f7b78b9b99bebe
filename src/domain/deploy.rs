//! 部署相关领域模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 部署任务状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Running,
    Success,
    /// 没有可部署的附件，跳过
    Skipped,
    Failed,
}

impl DeployStatus {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStatus::Running => "running",
            DeployStatus::Success => "success",
            DeployStatus::Skipped => "skipped",
            DeployStatus::Failed => "failed",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeployStatus::Running)
    }
}

/// 流水线状态机
///
/// 严格顺序推进，没有回退；任一阶段失败直接终止
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Validated,
    Staged,
    Downloaded,
    Extracted,
    Promoted,
    Reloaded,
    Notified,
    Done,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Validated => "validated",
            PipelineState::Staged => "staged",
            PipelineState::Downloaded => "downloaded",
            PipelineState::Extracted => "extracted",
            PipelineState::Promoted => "promoted",
            PipelineState::Reloaded => "reloaded",
            PipelineState::Notified => "notified",
            PipelineState::Done => "done",
        }
    }

    /// 下一个状态，`Done` 之后没有状态
    pub fn next(&self) -> Option<PipelineState> {
        use PipelineState::*;
        match self {
            Received => Some(Validated),
            Validated => Some(Staged),
            Staged => Some(Downloaded),
            Downloaded => Some(Extracted),
            Extracted => Some(Promoted),
            Promoted => Some(Reloaded),
            Reloaded => Some(Notified),
            Notified => Some(Done),
            Done => None,
        }
    }
}

/// 阶段状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// 部署阶段信息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployStage {
    /// 阶段标识 (e.g., "stage", "download", "promote")
    pub name: String,
    /// 显示名称 (e.g., "Prepare Release Dir", "Download Assets")
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    pub status: StageStatus,
    /// 附加信息
    pub message: Option<String>,
}

impl DeployStage {
    /// 创建新的待执行阶段
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    /// 完成阶段
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 跳过阶段
    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }
}

/// 一次部署的全部阶段，顺序与 [`PipelineState`] 一致
pub fn pipeline_stages() -> Vec<DeployStage> {
    vec![
        DeployStage::new("stage", "Prepare Release Dir"),
        DeployStage::new("download", "Download Assets"),
        DeployStage::new("extract", "Extract Archives"),
        DeployStage::new("promote", "Promote To Site"),
        DeployStage::new("reload", "Reload Service"),
        DeployStage::new("notify", "Send Notification"),
    ]
}

/// 部署任务信息
#[derive(Clone, Debug, Serialize)]
pub struct DeployTask {
    pub id: String,
    pub owner: String,
    pub repo: String,
    pub tag: String,
    pub status: DeployStatus,
    /// 最后到达的流水线状态
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 部署阶段详情
    pub stages: Vec<DeployStage>,
}

impl DeployTask {
    /// 创建新任务
    pub fn new(id: String, owner: &str, repo: &str, tag: &str) -> Self {
        Self {
            id,
            owner: owner.to_string(),
            repo: repo.to_string(),
            tag: tag.to_string(),
            status: DeployStatus::Running,
            state: PipelineState::Validated,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            stages: pipeline_stages(),
        }
    }

    /// `owner/repo`
    pub fn repo_key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// 设置任务完成
    pub fn complete(&mut self, status: DeployStatus, error: Option<String>) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_status_as_str() {
        assert_eq!(DeployStatus::Running.as_str(), "running");
        assert_eq!(DeployStatus::Success.as_str(), "success");
        assert_eq!(DeployStatus::Skipped.as_str(), "skipped");
        assert_eq!(DeployStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_deploy_status_is_terminal() {
        assert!(!DeployStatus::Running.is_terminal());
        assert!(DeployStatus::Success.is_terminal());
        assert!(DeployStatus::Skipped.is_terminal());
        assert!(DeployStatus::Failed.is_terminal());
    }

    #[test]
    fn test_pipeline_is_strictly_forward() {
        let mut state = PipelineState::Received;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            state = next;
            visited.push(state);
        }
        assert_eq!(visited.len(), 9);
        assert_eq!(state, PipelineState::Done);
    }

    #[test]
    fn test_deploy_stage_lifecycle() {
        let mut stage = DeployStage::new("test", "Test Stage");
        assert_eq!(stage.status, StageStatus::Pending);

        stage.start();
        assert_eq!(stage.status, StageStatus::Running);
        assert!(stage.started_at.is_some());

        stage.finish(true, Some("Done".to_string()));
        assert_eq!(stage.status, StageStatus::Success);
        assert!(stage.finished_at.is_some());
        assert!(stage.duration_ms.is_some());
    }

    #[test]
    fn test_new_task_has_all_stages_pending() {
        let task = DeployTask::new("t-1".to_string(), "acme", "site", "v1");
        assert_eq!(task.repo_key(), "acme/site");
        assert_eq!(task.stages.len(), 6);
        assert!(task.stages.iter().all(|s| s.status == StageStatus::Pending));
    }
}
