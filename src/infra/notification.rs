//! 部署通知 HTTP Client
//!
//! 部署成功后向 webhook（Discord 兼容的 `{"content": ...}` 格式）推送一条消息。
//! 通知是尽力而为的：调用方只记录错误，不影响部署结果

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::DeployError;

/// 通知发送能力
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 发送一条文本消息
    async fn notify(&self, message: &str) -> Result<(), DeployError>;
}

/// Webhook 通知客户端
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    /// 创建新的通知客户端
    ///
    /// # Arguments
    /// * `webhook_url` - 通知 webhook URL（可选，未配置时跳过发送）
    pub fn new(webhook_url: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            webhook_url: webhook_url.filter(|url| !url.is_empty()),
        })
    }

    /// 检查是否配置了 webhook
    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[derive(Serialize)]
struct NotifyBody<'a> {
    content: &'a str,
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<(), DeployError> {
        if message.is_empty() {
            return Err(DeployError::Notification(
                "Message cannot be empty".to_string(),
            ));
        }

        let Some(url) = self.webhook_url.as_deref() else {
            debug!("Notification webhook not configured, skipping");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(&NotifyBody { content: message })
            .send()
            .await
            .map_err(|e| DeployError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::Notification(format!(
                "webhook returned status code: {}",
                status
            )));
        }

        info!(status = %status, "Notification sent");
        Ok(())
    }
}
