//! Release Deploy Agent - GitHub release 部署代理
//!
//! 接收 release webhook，下载附件、解压、换入站点目录，再重载 nginx / pm2

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod services;
pub mod state;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::env::constants::VERSION;
use crate::config::{EnvConfig, RepositoryConfig};
use crate::services::deploy::fs_utils::ensure_dir;
use crate::state::AppState;

/// 命令行传入的运行时配置
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// 覆盖环境变量中的端口
    pub port_override: Option<u16>,
    /// 开发模式：跳过 webhook 签名校验
    pub dev_mode: bool,
}

/// 初始化日志
///
/// 默认 `info`，可通过 `RUST_LOG` 覆盖
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 重复初始化（例如测试中）时忽略错误
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// 构建应用状态：读取环境变量、仓库配置，并确保暂存根目录存在
pub fn build_state(runtime: &RuntimeConfig) -> anyhow::Result<AppState> {
    let mut config = EnvConfig::from_env(runtime.dev_mode).context("Invalid configuration")?;
    if let Some(port) = runtime.port_override {
        config.port = port;
    }

    let repositories = RepositoryConfig::load(&config.config_file)?;
    ensure_dir(&config.assets_dir).context("Failed to prepare assets directory")?;

    AppState::new(config, repositories).context("Failed to create HTTP clients")
}

/// 启动代理并阻塞到收到退出信号
pub async fn init_and_run_agent_with_config(runtime: RuntimeConfig) -> anyhow::Result<()> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();
    init_tracing();

    info!(version = VERSION, dev_mode = runtime.dev_mode, "Starting release deploy agent");
    if runtime.dev_mode {
        tracing::warn!("Development mode is enabled, webhook signatures are not verified");
    }

    let state = Arc::new(build_state(&runtime)?);
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
