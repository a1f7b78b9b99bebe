//! 统一错误处理
//!
//! - `DeployError`：部署流水线的错误分类，每个阶段失败都落到其中一个变体
//! - `ApiError`：HTTP 层错误，实现 `IntoResponse`；只有进入流水线前被拒绝的 release 返回 400

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 部署流水线错误
#[derive(Debug, Error)]
pub enum DeployError {
    /// 必填参数为空或非法
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 目录创建 / 列举 / 清理 / 删除 / 硬链接失败
    #[error("{context}: {source}")]
    Directory {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// 传输错误、非 2xx、写文件失败
    #[error("Failed to download asset \"{asset}\": {reason}")]
    Download { asset: String, reason: String },

    /// 解压过程中的解码或 I/O 错误
    #[error("Failed to extract archive \"{archive}\": {reason}")]
    Extraction { archive: String, reason: String },

    /// 仓库未配置、站点目录未设置
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 重载命令失败（附带合并后的 stdout+stderr）
    #[error("Failed to reload {target}: {output}")]
    Reload { target: String, output: String },

    #[error("Unsupported target type: \"{0}\"")]
    UnsupportedTargetType(String),

    /// 通知失败，仅记录日志，不影响部署结果
    #[error("Failed to send notification: {0}")]
    Notification(String),
}

impl DeployError {
    pub fn directory(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Directory {
            context: context.into(),
            source,
        }
    }

    pub fn download(asset: impl Into<String>, reason: impl ToString) -> Self {
        Self::Download {
            asset: asset.into(),
            reason: reason.to_string(),
        }
    }

    pub fn extraction(archive: impl Into<String>, reason: impl ToString) -> Self {
        Self::Extraction {
            archive: archive.into(),
            reason: reason.to_string(),
        }
    }

    /// 稳定的错误类型标识，用于响应体和日志
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::InvalidArgument(_) => "invalid_argument",
            DeployError::Directory { .. } => "directory_error",
            DeployError::Download { .. } => "download_error",
            DeployError::Extraction { .. } => "extraction_error",
            DeployError::Configuration(_) => "configuration_error",
            DeployError::Reload { .. } => "reload_error",
            DeployError::UnsupportedTargetType(_) => "unsupported_target_type",
            DeployError::Notification(_) => "notification_error",
        }
    }
}

/// API 错误响应结构
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
        }
    }
}

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 404 - 资源未找到
    NotFound(String),
    /// 400 - 请求无效（签名错误、payload 无法解析、事件类型不支持）
    BadRequest(String),
    /// 400 - release 内容不合法，在任何文件操作之前被拒绝
    InvalidRelease(DeployError),
    /// 500 - 内部错误
    Internal(String),
    /// 500 - 部署流水线某个阶段失败
    Deploy(DeployError),
}

impl ApiError {
    /// 创建未找到错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// 创建请求无效错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        Self::Deploy(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("not_found", format!("{} not found", resource)),
            ),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("bad_request", msg))
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("internal_error", msg),
            ),
            ApiError::InvalidRelease(err) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(err.kind(), err.to_string()),
            ),
            ApiError::Deploy(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(err.kind(), err.to_string()),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound(r) => write!(f, "Not found: {}", r),
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
            ApiError::InvalidRelease(e) => write!(f, "Invalid release: {}", e),
            ApiError::Internal(m) => write!(f, "Internal error: {}", m),
            ApiError::Deploy(e) => write!(f, "Deploy failed: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_new() {
        let resp = ErrorResponse::new("test_error", "Test message");
        assert_eq!(resp.kind, "test_error");
        assert_eq!(resp.error, "Test message");
    }

    #[test]
    fn test_directory_error_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DeployError::directory("Failed to create release directory", io);
        assert_eq!(err.kind(), "directory_error");
        assert!(err.to_string().contains("Failed to create release directory"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_deploy_error_status_codes() {
        let rejected =
            ApiError::InvalidRelease(DeployError::InvalidArgument("duplicate asset".into()))
                .into_response();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        // 进入流水线之后的失败一律是服务端错误
        for err in [
            DeployError::InvalidArgument("link outside release".into()),
            DeployError::Configuration("pm2 target requires a process name".into()),
            DeployError::UnsupportedTargetType("apache".into()),
        ] {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }

        let internal = ApiError::internal("join failed").into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unsupported_target_names_tag() {
        let err = DeployError::UnsupportedTargetType("apache".into());
        assert_eq!(err.kind(), "unsupported_target_type");
        assert!(err.to_string().contains("apache"));
    }
}
