use async_trait::async_trait;

use crate::core::error::Result;

/// 写入 Cookie 的请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRequest {
    /// Cookie 归属的站点地址
    pub url: String,
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl CookieRequest {
    /// 渲染为 `Set-Cookie` 头格式
    pub fn to_set_cookie(&self) -> String {
        format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        )
    }
}

/// Cookie 旁路通道
///
/// 只确认写入结果 (`Ok(true)` 即 `{ok: true}`)，不回读 Cookie 内容。
#[async_trait]
pub trait CookieChannel: Send + Sync {
    async fn set_cookie(&self, request: &CookieRequest) -> Result<bool>;
}
