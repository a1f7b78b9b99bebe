//! GitHub webhook API
//!
//! 包含 /deploy-with-gh 端点

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::release::{ReleaseEvent, RELEASED_ACTION};
use crate::error::{ApiError, ApiResult};
use crate::middleware::SignedPayload;
use crate::services::deploy::{self, DeployOutcome};
use crate::state::AppState;

/// webhook 响应
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum WebhookResponse {
    /// 部署完成，回显触发动作
    Action { action: String },
    /// 未执行部署的说明
    Message { message: String },
}

impl WebhookResponse {
    fn message(message: impl Into<String>) -> Self {
        WebhookResponse::Message {
            message: message.into(),
        }
    }
}

/// 创建 webhook 路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/deploy-with-gh", post(deploy_with_gh))
}

/// 处理 GitHub webhook
///
/// POST /deploy-with-gh
/// 需要有效的 `X-Hub-Signature-256`（开发模式除外）
async fn deploy_with_gh(
    State(state): State<Arc<AppState>>,
    payload: SignedPayload,
) -> ApiResult<Json<WebhookResponse>> {
    let event_type = payload
        .event_type
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Unrecognized event type"))?;

    match event_type {
        "release" => {}
        "ping" => {
            info!("Received webhook ping");
            return Ok(Json(WebhookResponse::message("pong")));
        }
        other => {
            warn!(event_type = %other, "Unsupported webhook event");
            return Err(ApiError::bad_request("Unsupported event type"));
        }
    }

    let event = ReleaseEvent::from_json(&payload.body).map_err(|e| {
        warn!(error = %e, "Failed to parse release payload");
        ApiError::bad_request(format!("Invalid release payload: {}", e))
    })?;

    if !event.action.triggers_deploy() {
        info!(
            repository = %event.repo_key(),
            action = %event.action.as_str(),
            "Ignoring release action"
        );
        return Ok(Json(WebhookResponse::message(format!(
            "Only \"{}\" action is supported, ignoring...",
            RELEASED_ACTION
        ))));
    }

    deploy::validate_release(&event).map_err(|e| {
        warn!(repository = %event.repo_key(), error = %e, "Rejecting release");
        ApiError::InvalidRelease(e)
    })?;

    // 流水线在独立任务中执行，调用方断开连接不会中断部署
    let task = tokio::spawn({
        let event = event.clone();
        async move { deploy::execute(state, &event).await }
    });
    let outcome = task.await.map_err(|e| {
        warn!(repository = %event.repo_key(), error = %e, "Deployment task did not complete");
        ApiError::internal(format!("Deployment task did not complete: {}", e))
    })??;

    match outcome {
        DeployOutcome::Deployed { .. } => Ok(Json(WebhookResponse::Action {
            action: event.action.as_str().to_string(),
        })),
        DeployOutcome::Skipped { tag, .. } => Ok(Json(WebhookResponse::message(format!(
            "No assets found for release \"{}\", will skip the request.",
            tag
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shapes() {
        let action = serde_json::to_value(WebhookResponse::Action {
            action: "released".to_string(),
        })
        .unwrap();
        assert_eq!(action, serde_json::json!({ "action": "released" }));

        let message = serde_json::to_value(WebhookResponse::message("pong")).unwrap();
        assert_eq!(message, serde_json::json!({ "message": "pong" }));
    }
}
