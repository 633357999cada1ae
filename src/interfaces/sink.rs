use async_trait::async_trait;

use crate::core::error::Result;

/// 下载提交请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// 直链
    pub url: String,
    /// 相对保存路径
    pub filename: String,
    /// 来源查看页，部分站点校验 Referer
    pub referer: Option<String>,
}

/// 下载回执
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadId(pub u64);

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 下载落地能力 (黑盒)
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn submit(&self, request: DownloadRequest) -> Result<DownloadId>;
}
