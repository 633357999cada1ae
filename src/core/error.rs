//! 错误处理体系 (Error Handling System)
//!
//! 定义解析链路与下载链路的领域错误类型以及全局 Result 别名。
//! 所有错误都局限于单个下载任务，不存在批次级致命错误。

use reqwest::StatusCode;
use thiserror::Error;

/// 全局错误定义 (Reaper Domain Errors)
#[derive(Error, Debug)]
pub enum ReaperError {
    /// 无法解析为带主机名的绝对 URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// 非 2xx 响应
    #[error("Fetch failed: HTTP {status} for {url}")]
    FetchFailed { url: String, status: StatusCode },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// 页面中既没有主图元素也没有元数据回退
    #[error("Image element not found on {0}")]
    ElementNotFound(String),

    /// 中间页跳转次数耗尽
    #[error("Interstitial still present after {follows} follow(s): {url}")]
    InterstitialExhausted { url: String, follows: u32 },

    #[error("Strategy timed out after {0:?}")]
    StrategyTimeout(std::time::Duration),

    /// Cookie 旁路通道未在时限内确认，仅作告警
    #[error("Cookie side-channel timed out for {0}")]
    CookieTimeout(String),

    #[error("Download sink error: {0}")]
    Sink(String),

    /// 已有批次正在执行
    #[error("A batch is already in flight")]
    BatchInFlight,

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, ReaperError>;

impl ReaperError {
    /// 提取错误中携带的 HTTP 状态码
    ///
    /// 支持中间件嵌套错误的分层解包 (Downcasting)。
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ReaperError::FetchFailed { status, .. } => Some(*status),
            ReaperError::Network(e) => e.status(),
            ReaperError::Middleware(reqwest_middleware::Error::Reqwest(e)) => e.status(),
            ReaperError::Middleware(reqwest_middleware::Error::Middleware(inner)) => inner
                .downcast_ref::<ReaperError>()
                .and_then(|e| e.status()),
            _ => None,
        }
    }

    /// 是否属于取页阶段的失败 (可在中间页策略内重试)
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            ReaperError::FetchFailed { .. }
                | ReaperError::Network(_)
                | ReaperError::Middleware(_)
        )
    }
}
