//! 环境变量配置加载

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use constants::{DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_RELOAD_TIMEOUT_SECS};

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: \"{value}\"")]
    Invalid { name: &'static str, value: String },

    #[error("Failed to read repository config \"{path}\": {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse repository config \"{path}\": {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 服务监听端口
    pub port: u16,
    /// release 暂存根目录
    pub assets_dir: PathBuf,
    /// webhook 签名密钥（开发模式下可为空）
    pub secret_token: String,
    /// GitHub access token，用于下载附件
    pub github_token: String,
    /// 仓库配置文件路径
    pub config_file: PathBuf,
    /// 部署通知 webhook
    pub notification_webhook_url: Option<String>,
    /// 开发模式：跳过签名校验
    pub dev_mode: bool,
    /// 单个附件下载超时
    pub download_timeout: Duration,
    /// 重载命令超时
    pub reload_timeout: Duration,
}

impl EnvConfig {
    /// 从环境变量加载配置
    ///
    /// `dev_override` 为命令行 `--dev`，与 `DEPLOY_AGENT_DEV` 任一开启即进入开发模式
    pub fn from_env(dev_override: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(dev_override, |name| env::var(name).ok())
    }

    /// 从任意键值来源加载，空字符串视为未设置
    pub fn from_lookup<F>(dev_override: bool, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let dev_mode = dev_override || get("DEPLOY_AGENT_DEV").map_or(false, |v| is_truthy(&v));

        // Port - 支持通用 PORT 兼容
        let port = match get("DEPLOY_AGENT_PORT").or_else(|| get("PORT")) {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "DEPLOY_AGENT_PORT",
                value: v,
            })?,
            None => DEFAULT_PORT,
        };

        let assets_dir = get("DEPLOY_AGENT_ASSETS_DIR")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("DEPLOY_AGENT_ASSETS_DIR"))?;

        let secret_token = match get("DEPLOY_AGENT_SECRET_TOKEN") {
            Some(token) => token,
            None if dev_mode => {
                warn!("DEPLOY_AGENT_SECRET_TOKEN not set, webhook signatures will not be verified");
                String::new()
            }
            None => return Err(ConfigError::Missing("DEPLOY_AGENT_SECRET_TOKEN")),
        };

        // GitHub token - 支持 GITHUB_TOKEN 兼容
        let github_token = get("DEPLOY_AGENT_GITHUB_TOKEN")
            .or_else(|| get("GITHUB_TOKEN"))
            .ok_or(ConfigError::Missing("DEPLOY_AGENT_GITHUB_TOKEN"))?;

        let config_file = get("DEPLOY_AGENT_CONFIG_FILE")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("DEPLOY_AGENT_CONFIG_FILE"))?;

        let notification_webhook_url = get("DEPLOY_AGENT_NOTIFICATION_WEBHOOK_URL");

        let download_timeout = parse_secs(
            "DEPLOY_AGENT_DOWNLOAD_TIMEOUT_SECS",
            get("DEPLOY_AGENT_DOWNLOAD_TIMEOUT_SECS"),
            DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        )?;
        let reload_timeout = parse_secs(
            "DEPLOY_AGENT_RELOAD_TIMEOUT_SECS",
            get("DEPLOY_AGENT_RELOAD_TIMEOUT_SECS"),
            DEFAULT_RELOAD_TIMEOUT_SECS,
        )?;

        Ok(Self {
            port,
            assets_dir,
            secret_token,
            github_token,
            config_file,
            notification_webhook_url,
            dev_mode,
            download_timeout,
            reload_timeout,
        })
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_secs(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    match value {
        Some(v) => v
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid { name, value: v }),
        None => Ok(Duration::from_secs(default)),
    }
}

/// 常量
pub mod constants {
    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 8080;

    /// 单个附件下载超时（秒）
    pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

    /// 重载命令超时（秒）
    pub const DEFAULT_RELOAD_TIMEOUT_SECS: u64 = 60;

    /// 任务历史最大保存数量
    pub const MAX_TASK_HISTORY: usize = 100;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DEPLOY_AGENT_ASSETS_DIR", "/srv/releases"),
        ("DEPLOY_AGENT_SECRET_TOKEN", "s3cret"),
        ("DEPLOY_AGENT_GITHUB_TOKEN", "ghp_x"),
        ("DEPLOY_AGENT_CONFIG_FILE", "/etc/agent/repos.json"),
    ];

    #[test]
    fn test_defaults() {
        let config = EnvConfig::from_lookup(false, lookup(REQUIRED)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.assets_dir, PathBuf::from("/srv/releases"));
        assert_eq!(config.secret_token, "s3cret");
        assert!(!config.dev_mode);
        assert!(config.notification_webhook_url.is_none());
        assert_eq!(config.download_timeout, Duration::from_secs(300));
        assert_eq!(config.reload_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_fallback_names() {
        let config = EnvConfig::from_lookup(
            false,
            lookup(&[
                ("DEPLOY_AGENT_ASSETS_DIR", "/srv/releases"),
                ("DEPLOY_AGENT_SECRET_TOKEN", "s3cret"),
                ("GITHUB_TOKEN", "ghp_fallback"),
                ("DEPLOY_AGENT_CONFIG_FILE", "/etc/agent/repos.json"),
                ("PORT", "9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.github_token, "ghp_fallback");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_secret_required_outside_dev_mode() {
        let pairs: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "DEPLOY_AGENT_SECRET_TOKEN")
            .collect();

        let result = EnvConfig::from_lookup(false, lookup(&pairs));
        assert!(matches!(
            result,
            Err(ConfigError::Missing("DEPLOY_AGENT_SECRET_TOKEN"))
        ));

        let config = EnvConfig::from_lookup(true, lookup(&pairs)).unwrap();
        assert!(config.dev_mode);
        assert!(config.secret_token.is_empty());
    }

    #[test]
    fn test_dev_mode_from_env() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEPLOY_AGENT_DEV", "true"));
        let config = EnvConfig::from_lookup(false, lookup(&pairs)).unwrap();
        assert!(config.dev_mode);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEPLOY_AGENT_PORT", "not-a-port"));
        assert!(matches!(
            EnvConfig::from_lookup(false, lookup(&pairs)),
            Err(ConfigError::Invalid { name: "DEPLOY_AGENT_PORT", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEPLOY_AGENT_RELOAD_TIMEOUT_SECS", "-1"));
        assert!(matches!(
            EnvConfig::from_lookup(false, lookup(&pairs)),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_missing_assets_dir() {
        let result = EnvConfig::from_lookup(false, lookup(&[]));
        assert!(matches!(
            result,
            Err(ConfigError::Missing("DEPLOY_AGENT_ASSETS_DIR"))
        ));
    }
}
