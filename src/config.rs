//! 应用配置模块
//!
//! 负责从环境变量加载应用配置，包括：
//! - 服务器监听地址和端口
//! - 上游 API 密钥
//! - 静态文件目录
//! - 上游 chat-completion 参数（可选 TOML 文件）

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STATIC_DIR: &str = "./public";

const DEFAULT_BASE_URL: &str = "https://api.fireworks.ai/inference/v1/chat/completions";
const DEFAULT_MODEL: &str =
    "accounts/sentientfoundation-serverless/models/dobby-mini-unhinged-plus-llama-3-1-8b";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 200;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 应用配置
///
/// 启动时加载一次，之后只读
#[derive(Clone)]
pub struct Config {
    /// 服务器监听地址（如 "0.0.0.0" 或 "127.0.0.1"）
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// 上游 API 密钥（Bearer token），缺失时 /motivate 返回 500
    pub api_key: Option<String>,
    /// 静态文件根目录
    pub static_dir: PathBuf,
    /// 上游 chat-completion 配置
    pub upstream: UpstreamConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("static_dir", &self.static_dir)
            .field("upstream", &self.upstream)
            .finish()
    }
}

/// 上游 chat-completion 配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// chat-completion 端点完整 URL
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// 生成 token 上限，`None` 表示不限制（TOML 中写 0）
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl UpstreamConfig {
    /// 从 TOML 文件加载，未出现的字段使用默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read upstream config {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid upstream config {}", path.display()))?;
        // max_tokens = 0 表示不限制长度
        if config.max_tokens == Some(0) {
            config.max_tokens = None;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.timeout_secs > 0, "timeout_secs must be greater than 0");
        ensure!(!self.base_url.is_empty(), "base_url must not be empty");
        ensure!(!self.model.is_empty(), "model must not be empty");
        if self.timeout_secs > DEFAULT_TIMEOUT_SECS {
            tracing::warn!(
                timeout_secs = self.timeout_secs,
                "Upstream timeout is above the recommended {}s ceiling",
                DEFAULT_TIMEOUT_SECS
            );
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// # 环境变量
    ///
    /// - `UPLIFT_HOST`: 服务器监听地址（默认: "0.0.0.0"）
    /// - `UPLIFT_PORT`: 服务器监听端口（默认: 3000）
    /// - `API_KEY`: 上游 API 密钥（可选，空字符串视为未设置）
    /// - `UPLIFT_STATIC_DIR`: 静态文件目录（默认: "./public"）
    /// - `UPLIFT_UPSTREAM_CONFIG`: 上游配置 TOML 文件路径（可选）
    ///
    /// # 错误
    ///
    /// - 如果 `UPLIFT_PORT` 不是有效的端口号
    /// - 如果上游配置文件无法读取或解析
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 使用自定义查找函数加载配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("UPLIFT_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("UPLIFT_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .context("UPLIFT_PORT must be a valid port number")?,
            None => DEFAULT_PORT,
        };

        let api_key = lookup("API_KEY").filter(|key| !key.is_empty());

        let static_dir = PathBuf::from(
            lookup("UPLIFT_STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
        );

        let upstream = match lookup("UPLIFT_UPSTREAM_CONFIG") {
            Some(path) => UpstreamConfig::load(path)?,
            None => UpstreamConfig::default(),
        };

        Ok(Self {
            host,
            port,
            api_key,
            static_dir,
            upstream,
        })
    }

    /// 本地访问地址，供 `test` 命令使用
    pub fn local_url(&self, path: &str) -> String {
        let host = if self.host == "0.0.0.0" {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        format!("http://{}:{}{}", host, self.port, path)
    }
}
