use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use tracing::debug;

use crate::core::config::HttpConfig;
use crate::core::error::{ReaperError, Result};
use crate::interfaces::{Page, PageFetcher};
use crate::network::middleware::{Referer, SessionMiddleware, StatusMiddleware};
use crate::network::session::Session;

/// HTTP 服务
///
/// 页面获取与直链下载共用同一个客户端及 Cookie 罐。
#[derive(Clone)]
pub struct HttpService {
    client: ClientWithMiddleware,
    session: Arc<Session>,
}

impl HttpService {
    pub fn new(config: &HttpConfig, session: Arc<Session>) -> Result<Self> {
        let client = Self::try_build_internal_client(config, &session)?;
        Ok(Self { client, session })
    }

    /// 构建底层的 HTTP 客户端
    fn try_build_internal_client(config: &HttpConfig, session: &Session) -> Result<ClientWithMiddleware> {
        let client = reqwest::Client::builder()
            .cookie_provider(session.jar())
            .pool_max_idle_per_host(16)
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ReaperError::Network)?;

        Ok(ClientBuilder::new(client)
            .with(SessionMiddleware)
            .with(StatusMiddleware)
            .build())
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// 构造携带会话上下文的请求
    pub fn request_builder(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .with_extension(self.session.clone())
    }

    /// 执行 GET，可附带来源页
    pub async fn get(&self, url: &str, referer: Option<&str>) -> Result<reqwest::Response> {
        let mut rb = self.request_builder(Method::GET, url);
        if let Some(referer) = referer {
            rb = rb.with_extension(Referer(referer.to_string()));
        }
        rb.send().await.map_err(ReaperError::Middleware)
    }
}

#[async_trait]
impl PageFetcher for HttpService {
    async fn fetch(&self, url: &str) -> Result<Page> {
        debug!("Fetching {}", url);
        let resp = self.get(url, None).await?;
        let final_url = resp.url().clone();
        let body = resp.text().await.map_err(ReaperError::Network)?;
        Ok(Page::new(final_url, body))
    }
}
