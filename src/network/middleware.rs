use std::sync::Arc;

use reqwest::header::{HeaderValue, REFERER, USER_AGENT};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::{debug, warn};

use crate::core::error::ReaperError;
use crate::network::session::Session;

/// 请求来源页标记
///
/// 作为请求扩展挂载，由 `SessionMiddleware` 写入 `Referer` 头。
#[derive(Clone, Debug)]
pub struct Referer(pub String);

/// 会话注入中间件
/// 负责在每次请求前，动态将 Session 中的最新 UA/附加头以及来源页注入 Header
pub struct SessionMiddleware;

#[async_trait::async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(session) = extensions.get::<Arc<Session>>() {
            let headers = req.headers_mut();

            let ua = session.get_ua();
            if !ua.is_empty()
                && let Ok(val) = HeaderValue::from_str(&ua)
            {
                headers.insert(USER_AGENT, val);
            }

            for (k, v) in session.get_headers().iter() {
                headers.insert(k.clone(), v.clone());
            }
        }

        if let Some(Referer(referer)) = extensions.get::<Referer>()
            && let Ok(val) = HeaderValue::from_str(referer)
        {
            req.headers_mut().insert(REFERER, val);
        }

        next.run(req, extensions).await
    }
}

/// 状态码检查中间件
/// 非 2xx 一律上报 `FetchFailed`，由调用方决定是否重试
pub struct StatusMiddleware;

#[async_trait::async_trait]
impl Middleware for StatusMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let url = req.url().to_string();
        let resp = next.run(req, extensions).await?;
        let status = resp.status();

        if !status.is_success() {
            warn!("HTTP {} <- {}", status, url);
            return Err(reqwest_middleware::Error::from(anyhow::Error::new(
                ReaperError::FetchFailed { url, status },
            )));
        }

        debug!("HTTP {} <- {}", status, url);
        Ok(resp)
    }
}
