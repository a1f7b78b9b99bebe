//! GitHub release 附件下载客户端
//!
//! 使用 bearer token 认证，显式请求 `application/octet-stream`，按块流式写入文件

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::domain::release::Asset;
use crate::error::DeployError;

/// 单个附件的下载能力
///
/// 流水线只依赖这个 trait，测试中可以替换为假实现
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    /// 下载 `asset` 并完整写入 `output`
    async fn download_asset(&self, asset: &Asset, output: &Path) -> Result<(), DeployError>;
}

/// GitHub 附件客户端
#[derive(Clone)]
pub struct GithubAssetClient {
    client: Client,
    access_token: String,
}

impl GithubAssetClient {
    /// 创建客户端
    ///
    /// # Arguments
    /// * `access_token` - GitHub access token
    /// * `timeout` - 单个附件请求的超时时间（含 body 传输）
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("release-deploy-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()?;

        Ok(Self {
            client,
            access_token: access_token.into(),
        })
    }
}

#[async_trait]
impl AssetDownloader for GithubAssetClient {
    async fn download_asset(&self, asset: &Asset, output: &Path) -> Result<(), DeployError> {
        info!(asset = %asset.name, url = %asset.url, "Downloading asset");

        let mut response = self
            .client
            .get(&asset.url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await
            .map_err(|e| DeployError::download(&asset.name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::download(
                &asset.name,
                format!("status code: {}", status),
            ));
        }

        let mut file = tokio::fs::File::create(output).await.map_err(|e| {
            DeployError::download(
                &asset.name,
                format!("cannot create \"{}\": {}", output.display(), e),
            )
        })?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DeployError::download(&asset.name, format!("body stream failed: {}", e)))?
        {
            file.write_all(&chunk).await.map_err(|e| {
                DeployError::download(&asset.name, format!("write failed: {}", e))
            })?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| DeployError::download(&asset.name, format!("flush failed: {}", e)))?;

        info!(
            asset = %asset.name,
            path = %output.display(),
            size = written,
            "Asset downloaded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tempfile::TempDir;

    fn client() -> GithubAssetClient {
        GithubAssetClient::new("test-token", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_download_sends_auth_and_accept_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/assets/1")
            .match_header("authorization", "Bearer test-token")
            .match_header("accept", "application/octet-stream")
            .with_status(200)
            .with_body("binary-content")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("site.tar.gz");
        let asset = Asset::new("site.tar.gz", format!("{}/assets/1", server.url()));

        client().download_asset(&asset, &output).await.unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&output).unwrap(), b"binary-content");
    }

    #[tokio::test]
    async fn test_non_success_status_is_download_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/assets/404")
            .with_status(404)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("missing.bin");
        let asset = Asset::new("missing.bin", format!("{}/assets/404", server.url()));

        let result = client().download_asset(&asset, &output).await;

        match result {
            Err(DeployError::Download { asset, reason }) => {
                assert_eq!(asset, "missing.bin");
                assert!(reason.contains("404"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_download_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/assets/2")
            .with_status(200)
            .with_body("data")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("no-such-dir/file.bin");
        let asset = Asset::new("file.bin", format!("{}/assets/2", server.url()));

        let result = client().download_asset(&asset, &output).await;
        assert!(matches!(result, Err(DeployError::Download { .. })));
    }

    #[tokio::test]
    async fn test_transport_error_is_download_error() {
        let temp_dir = TempDir::new().unwrap();
        // 端口 9 (discard) 通常没有监听
        let asset = Asset::new("x.bin", "http://127.0.0.1:9/assets/x");

        let result = client()
            .download_asset(&asset, &temp_dir.path().join("x.bin"))
            .await;
        assert!(matches!(result, Err(DeployError::Download { .. })));
    }
}
