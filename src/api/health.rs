//! 健康检查 API
//!
//! 包含 /ping, /health 端点

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    started_at: String,
    dev_mode: bool,
    repositories: Vec<String>,
    active_deploys: usize,
    recent_deploys: usize,
}

/// 创建健康检查路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
}

/// GET /ping
async fn ping() -> &'static str {
    "pong"
}

/// 健康检查 - 返回状态、版本、已配置仓库等信息
///
/// GET /health
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let repositories = state
        .repositories
        .repositories
        .iter()
        .map(|repo| format!("{}/{}", repo.owner, repo.name))
        .collect();

    Json(HealthResponse {
        status: "ok",
        service: "release-deploy-agent",
        version: VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        started_at: state.started_at.to_rfc3339(),
        dev_mode: state.config.dev_mode,
        repositories,
        active_deploys: state.task_store.active_count().await,
        recent_deploys: state.task_store.history_count().await,
    })
}
