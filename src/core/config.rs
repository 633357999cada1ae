//! 配置管理系统 (Configuration Management)
//!
//! 负责 `reaper.toml` 的反序列化及其层级结构映射，支持环境变量与默认值回退机制。
//! 配置在构造阶段显式注入各组件，不存在运行期切换的全局开关。

use std::path::Path;

use bon::Builder;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::core::error::{ReaperError, Result};

/// 默认配置文件名
pub const CONFIG_FILE: &str = "reaper.toml";

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct AppConfig {
    /// 批量下载参数
    #[serde(default)]
    #[builder(default)]
    pub download: DownloadConfig,

    /// HTTP 客户端参数
    #[serde(default)]
    #[builder(default)]
    pub http: HttpConfig,

    /// 链接解析参数
    #[serde(default)]
    #[builder(default)]
    pub resolver: ResolverConfig,

    /// 日志级别 (RUST_LOG 优先)
    #[serde(default = "default_log_level")]
    #[builder(default = default_log_level())]
    pub log_level: String,
}

/// 批量下载参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct DownloadConfig {
    /// 相对保存目录
    #[serde(default = "default_folder")]
    #[builder(default = default_folder())]
    pub folder: String,
    /// 文件名前缀
    #[serde(default)]
    #[builder(default)]
    pub prefix: String,
    /// 并发上限
    #[serde(default = "default_concurrency")]
    #[builder(default = default_concurrency())]
    pub concurrency: usize,
    /// 下载落盘根目录
    #[serde(default = "default_output_dir")]
    #[builder(default = default_output_dir())]
    pub output_dir: String,
}

/// HTTP 客户端参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    #[builder(default = default_user_agent())]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout")]
    #[builder(default = default_connect_timeout())]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    #[builder(default = default_timeout())]
    pub timeout_secs: u64,
}

/// 链接解析参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct ResolverConfig {
    /// Cookie 旁路通道确认时限
    #[serde(default = "default_cookie_timeout")]
    #[builder(default = default_cookie_timeout())]
    pub cookie_timeout_ms: u64,
    /// 中间页最大跟随次数
    #[serde(default = "default_max_follows")]
    #[builder(default = default_max_follows())]
    pub max_interstitial_follows: u32,
    /// 单次策略调用时限
    #[serde(default = "default_strategy_timeout")]
    #[builder(default = default_strategy_timeout())]
    pub strategy_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download: DownloadConfig::default(),
            http: HttpConfig::default(),
            resolver: ResolverConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            prefix: String::new(),
            concurrency: default_concurrency(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cookie_timeout_ms: default_cookie_timeout(),
            max_interstitial_follows: default_max_follows(),
            strategy_timeout_secs: default_strategy_timeout(),
        }
    }
}

fn default_folder() -> String {
    "ImageReaper".to_string()
}
fn default_concurrency() -> usize {
    8
}
fn default_output_dir() -> String {
    "downloads".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_timeout() -> u64 {
    30
}
fn default_cookie_timeout() -> u64 {
    3000
}
fn default_max_follows() -> u32 {
    2
}
fn default_strategy_timeout() -> u64 {
    45
}
fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// 从工作目录加载配置
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// 从指定文件加载并叠加 `REAPER__*` 环境变量
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let builder = Config::builder();

        let builder = if config_path.exists() {
            builder.add_source(File::from(config_path))
        } else {
            builder
        };

        let settings = builder
            .add_source(Environment::with_prefix("REAPER").separator("__"))
            .build()
            .map_err(ReaperError::Config)?;
        settings.try_deserialize().map_err(ReaperError::Config)
    }
}
