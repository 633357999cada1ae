//! 页面获取接口
//!
//! 获取文档并交给 `scraper` 解析；网络与状态码失败统一收敛为 `ReaperError`。

use async_trait::async_trait;
use scraper::Html;
use url::Url;

use crate::core::error::Result;

/// 已获取的文档
#[derive(Debug, Clone)]
pub struct Page {
    /// 跟随重定向后的最终地址，用于相对链接补全
    pub url: Url,
    pub body: String,
}

impl Page {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }

    /// 解析为可查询的 DOM
    ///
    /// `Html` 不是 `Send`，调用方必须在下一个 `.await` 之前释放它。
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// 页面获取器
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 获取文档；非 2xx 返回 `FetchFailed`
    async fn fetch(&self, url: &str) -> Result<Page>;
}
