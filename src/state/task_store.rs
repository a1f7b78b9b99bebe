//! 任务存储
//!
//! 管理进行中的部署任务和历史记录

use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::env::constants::MAX_TASK_HISTORY;
use crate::domain::deploy::{DeployStage, DeployStatus, DeployTask, PipelineState};

/// 任务存储
pub struct TaskStore {
    /// 进行中的任务
    tasks: RwLock<HashMap<String, DeployTask>>,
    /// 历史记录（最新的在前）
    history: RwLock<VecDeque<DeployTask>>,
    /// 最大历史记录数
    max_history: usize,
}

impl TaskStore {
    /// 创建新的任务存储
    pub fn new() -> Self {
        Self::with_capacity(MAX_TASK_HISTORY)
    }

    /// 使用自定义历史上限创建
    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
        }
    }

    /// 创建新任务
    pub async fn create(&self, task: DeployTask) -> String {
        let task_id = task.id.clone();
        let mut tasks = self.tasks.write().await;
        tasks.insert(task_id.clone(), task);
        task_id
    }

    /// 获取进行中的任务
    pub async fn get(&self, task_id: &str) -> Option<DeployTask> {
        let tasks = self.tasks.read().await;
        tasks.get(task_id).cloned()
    }

    /// 获取任务（优先进行中的任务，然后查历史记录）
    pub async fn get_any(&self, task_id: &str) -> Option<DeployTask> {
        if let Some(task) = self.get(task_id).await {
            return Some(task);
        }
        let history = self.history.read().await;
        history.iter().find(|t| t.id == task_id).cloned()
    }

    /// 获取所有进行中的任务
    pub async fn get_all(&self) -> Vec<DeployTask> {
        let tasks = self.tasks.read().await;
        tasks.values().cloned().collect()
    }

    /// 更新流水线进度
    pub async fn update_progress(
        &self,
        task_id: &str,
        state: PipelineState,
        stages: Vec<DeployStage>,
    ) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(task_id) {
            task.state = state;
            task.stages = stages;
        }
    }

    /// 完成任务并移到历史记录
    ///
    /// 只接受终态，`Running` 会被忽略
    pub async fn finish(&self, task_id: &str, status: DeployStatus, error: Option<String>) {
        if !status.is_terminal() {
            warn!(task_id = %task_id, "Refusing to finish task with non-terminal status");
            return;
        }

        let task = {
            let mut tasks = self.tasks.write().await;
            tasks.remove(task_id).map(|mut task| {
                task.complete(status, error);
                task
            })
        };

        if let Some(task) = task {
            self.add_to_history(task).await;
        }
    }

    /// 添加任务到历史记录
    pub async fn add_to_history(&self, task: DeployTask) {
        let mut history = self.history.write().await;
        history.push_front(task);

        while history.len() > self.max_history {
            history.pop_back();
        }
    }

    /// 获取历史记录
    ///
    /// `repo` 接受 `owner/repo` 或仅仓库名
    pub async fn get_history(
        &self,
        limit: usize,
        repo: Option<&str>,
        status: Option<&str>,
    ) -> Vec<DeployTask> {
        let history = self.history.read().await;

        history
            .iter()
            .filter(|task| {
                let repo_match = repo.map_or(true, |r| task.repo == r || task.repo_key() == r);
                let status_match = status.map_or(true, |s| task.status.as_str() == s);
                repo_match && status_match
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// 获取历史记录总数
    pub async fn history_count(&self) -> usize {
        let history = self.history.read().await;
        history.len()
    }

    /// 获取进行中的任务数量
    pub async fn active_count(&self) -> usize {
        let tasks = self.tasks.read().await;
        tasks.len()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
