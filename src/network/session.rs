use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderMap;
use tracing::debug;
use url::Url;

use crate::core::error::{ReaperError, Result};
use crate::interfaces::{CookieChannel, CookieRequest};

/// 会话状态：UA、共享 Cookie 罐与附加请求头
#[derive(Debug, Default)]
pub struct Session {
    pub ua: RwLock<String>,
    pub jar: Arc<Jar>,
    pub extra_headers: RwLock<HeaderMap>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ua(ua: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_ua(ua.into());
        session
    }

    pub fn set_ua(&self, ua: String) {
        *self.ua.write() = ua;
    }

    pub fn get_ua(&self) -> String {
        self.ua.read().clone()
    }

    pub fn set_headers(&self, headers: HeaderMap) {
        *self.extra_headers.write() = headers;
    }

    pub fn get_headers(&self) -> HeaderMap {
        self.extra_headers.read().clone()
    }

    /// 供 HTTP 客户端挂载的 Cookie 罐
    pub fn jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    /// 当前对某地址可见的 Cookie 头
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }
}

/// 以共享 Cookie 罐实现的旁路通道
///
/// 页面获取器与本通道共用同一个罐，写入后后续请求自动携带。
#[async_trait]
impl CookieChannel for Session {
    async fn set_cookie(&self, request: &CookieRequest) -> Result<bool> {
        let url = Url::parse(&request.url).map_err(|e| ReaperError::InvalidUrl(e.to_string()))?;
        self.jar.add_cookie_str(&request.to_set_cookie(), &url);

        let needle = format!("{}={}", request.name, request.value);
        let ok = self
            .cookie_header(&url)
            .is_some_and(|header| header.split("; ").any(|c| c == needle));
        debug!("Cookie {} -> {} (ok: {})", needle, request.domain, ok);
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imagebam_cookie() -> CookieRequest {
        CookieRequest {
            url: "https://www.imagebam.com/".into(),
            name: "nsfw_inter".into(),
            value: "1".into(),
            domain: ".imagebam.com".into(),
            path: "/".into(),
        }
    }

    #[tokio::test]
    async fn cookie_is_visible_to_subdomains() {
        let session = Session::new();
        assert!(session.set_cookie(&imagebam_cookie()).await.unwrap());

        let view = Url::parse("https://www.imagebam.com/view/ME1234").unwrap();
        assert!(session.cookie_header(&view).unwrap().contains("nsfw_inter=1"));

        let other = Url::parse("https://pixhost.to/show/1").unwrap();
        assert!(session.cookie_header(&other).is_none());
    }

    #[tokio::test]
    async fn invalid_cookie_url_is_rejected() {
        let session = Session::new();
        let mut request = imagebam_cookie();
        request.url = "not a url".into();
        assert!(matches!(
            session.set_cookie(&request).await,
            Err(ReaperError::InvalidUrl(_))
        ));
    }

    #[test]
    fn ua_round_trips() {
        let session = Session::with_ua("reaper/0.1");
        assert_eq!(session.get_ua(), "reaper/0.1");
    }
}
