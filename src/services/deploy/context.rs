//! 部署上下文
//!
//! 一次部署的执行上下文：任务 ID、阶段进度，并把进度同步到任务存储

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::deploy::{pipeline_stages, DeployStage, DeployStatus, DeployTask, PipelineState};
use crate::domain::release::ReleaseEvent;
use crate::error::DeployError;
use crate::state::AppState;

/// 部署执行上下文
pub struct DeployContext {
    /// 任务 ID
    pub task_id: String,
    /// 应用状态
    pub state: Arc<AppState>,
    stages: Vec<DeployStage>,
    pipeline: PipelineState,
}

impl DeployContext {
    /// 为 release 事件登记一个新任务
    pub async fn create(state: Arc<AppState>, event: &ReleaseEvent) -> Self {
        let task_id = Uuid::new_v4().to_string();
        let task = DeployTask::new(task_id.clone(), &event.owner, &event.repo, &event.tag);
        state.task_store.create(task).await;

        Self {
            task_id,
            state,
            stages: pipeline_stages(),
            pipeline: PipelineState::Validated,
        }
    }

    /// 最后到达的流水线状态
    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline
    }

    /// 开始执行阶段
    pub async fn start_stage(&mut self, name: &str) {
        if let Some(stage) = self.stage_mut(name) {
            stage.start();
        }
        debug!(task_id = %self.task_id, stage = %name, "Stage started");
        self.sync().await;
    }

    /// 根据阶段结果更新进度
    ///
    /// 成功时推进到 `reached`；失败时标记阶段失败，后续阶段全部跳过
    pub async fn track<T>(
        &mut self,
        name: &str,
        reached: PipelineState,
        result: Result<T, DeployError>,
    ) -> Result<T, DeployError> {
        match &result {
            Ok(_) => {
                if let Some(stage) = self.stage_mut(name) {
                    stage.finish(true, None);
                }
                self.pipeline = reached;
            }
            Err(err) => {
                if let Some(stage) = self.stage_mut(name) {
                    stage.finish(false, Some(err.to_string()));
                }
                self.skip_pending("Skipped after earlier failure");
            }
        }
        self.sync().await;
        result
    }

    /// 完成阶段并附带说明，不推进流水线状态
    pub async fn finish_stage(&mut self, name: &str, success: bool, message: Option<String>) {
        if let Some(stage) = self.stage_mut(name) {
            stage.finish(success, message);
        }
        self.sync().await;
    }

    /// 推进到下一个流水线状态
    pub async fn advance(&mut self) {
        if let Some(next) = self.pipeline.next() {
            self.pipeline = next;
        }
        self.sync().await;
    }

    /// 跳过所有未执行的阶段
    pub fn skip_pending(&mut self, reason: &str) {
        for stage in self
            .stages
            .iter_mut()
            .filter(|s| s.started_at.is_none())
        {
            stage.skip(Some(reason.to_string()));
        }
    }

    /// 完成任务并移入历史记录
    pub async fn finish(mut self, status: DeployStatus, error: Option<String>) {
        if status == DeployStatus::Success {
            self.pipeline = PipelineState::Done;
        }
        self.sync().await;
        self.state
            .task_store
            .finish(&self.task_id, status, error)
            .await;
    }

    fn stage_mut(&mut self, name: &str) -> Option<&mut DeployStage> {
        let stage = self.stages.iter_mut().find(|s| s.name == name);
        if stage.is_none() {
            warn!(stage = %name, "Unknown pipeline stage");
        }
        stage
    }

    async fn sync(&self) {
        self.state
            .task_store
            .update_progress(&self.task_id, self.pipeline, self.stages.clone())
            .await;
    }
}
