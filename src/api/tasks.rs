//! 部署任务查询 API
//!
//! 包含 /tasks/:task_id, /tasks/recent 端点

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::deploy::DeployTask;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 任务历史查询参数
#[derive(Debug, Deserialize)]
pub struct TaskHistoryQuery {
    /// 返回数量限制，默认 20
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// 仓库过滤（`owner/repo` 或仓库名）
    pub repo: Option<String>,
    /// 状态过滤
    pub status: Option<String>,
}

fn default_limit() -> usize {
    20
}

/// 任务历史响应
#[derive(Debug, Serialize)]
pub struct TaskHistoryResponse {
    pub tasks: Vec<DeployTask>,
    pub total: usize,
}

/// 创建任务查询路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/recent", get(get_recent_tasks))
        .route("/tasks/:task_id", get(get_task_status))
}

/// 获取任务状态
///
/// GET /tasks/:task_id
/// 查询进行中的任务和历史记录
async fn get_task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let task = state
        .task_store
        .get_any(&task_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Task '{}'", task_id)))?;

    Ok(Json(task))
}

/// 获取最近的任务
///
/// GET /tasks/recent
/// 进行中的任务排在历史记录前面
async fn get_recent_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskHistoryQuery>,
) -> impl IntoResponse {
    let repo = query.repo.as_deref();
    let status = query.status.as_deref();

    let mut tasks: Vec<DeployTask> = state
        .task_store
        .get_all()
        .await
        .into_iter()
        .filter(|task| {
            let repo_match = repo.map_or(true, |r| task.repo == r || task.repo_key() == r);
            let status_match = status.map_or(true, |s| task.status.as_str() == s);
            repo_match && status_match
        })
        .collect();
    tasks.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    tasks.extend(state.task_store.get_history(query.limit, repo, status).await);
    tasks.truncate(query.limit);

    let total = tasks.len();
    Json(TaskHistoryResponse { tasks, total })
}
