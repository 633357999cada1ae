//! 测试用的协作方替身

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use url::Url;

use super::{CookieChannel, CookieRequest, DownloadId, DownloadRequest, DownloadSink, Page, PageFetcher};
use crate::core::error::{ReaperError, Result};

/// 预置响应的页面获取器
#[derive(Default)]
pub struct FakeFetcher {
    pages: Mutex<HashMap<String, std::result::Result<String, u16>>>,
    fallback: Mutex<Option<Box<dyn Fn(&str) -> std::result::Result<String, u16> + Send + Sync>>>,
    delay: Mutex<Option<Box<dyn Fn(&str) -> Duration + Send + Sync>>>,
    pub fetches: AtomicUsize,
    pub log: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.pages.lock().insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn status(self, url: &str, status: u16) -> Self {
        self.pages.lock().insert(url.to_string(), Err(status));
        self
    }

    /// 未预置的地址交给闭包生成
    pub fn with_fallback(
        self,
        f: impl Fn(&str) -> std::result::Result<String, u16> + Send + Sync + 'static,
    ) -> Self {
        *self.fallback.lock() = Some(Box::new(f));
        self
    }

    pub fn with_delay(self, f: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        *self.delay.lock() = Some(Box::new(f));
        self
    }

    pub fn count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Page> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(url.to_string());

        let delay = self.delay.lock().as_ref().map(|f| f(url));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.pages.lock().get(url).cloned();
        let response = match scripted {
            Some(r) => r,
            None => match self.fallback.lock().as_ref() {
                Some(f) => f(url),
                None => Err(404),
            },
        };

        match response {
            Ok(body) => {
                let parsed = Url::parse(url).map_err(|e| ReaperError::InvalidUrl(e.to_string()))?;
                Ok(Page::new(parsed, body))
            }
            Err(code) => Err(ReaperError::FetchFailed {
                url: url.to_string(),
                status: StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY),
            }),
        }
    }
}

/// Cookie 通道替身
pub enum CookieMode {
    Confirm,
    Reject,
    Hang,
}

pub struct FakeCookies {
    mode: CookieMode,
    pub calls: AtomicUsize,
}

impl FakeCookies {
    pub fn new(mode: CookieMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CookieChannel for FakeCookies {
    async fn set_cookie(&self, _request: &CookieRequest) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            CookieMode::Confirm => Ok(true),
            CookieMode::Reject => Ok(false),
            CookieMode::Hang => {
                futures::future::pending::<()>().await;
                Ok(true)
            }
        }
    }
}

/// 记录提交的下载落地替身
#[derive(Default)]
pub struct FakeSink {
    pub submitted: Mutex<Vec<DownloadRequest>>,
    failing: Mutex<Vec<String>>,
    delay: Option<Duration>,
    next: AtomicUsize,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 直链包含该片段时提交失败
    pub fn fail_on(self, fragment: &str) -> Self {
        self.failing.lock().push(fragment.to_string());
        self
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl DownloadSink for FakeSink {
    async fn submit(&self, request: DownloadRequest) -> Result<DownloadId> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let fails = self
            .failing
            .lock()
            .iter()
            .any(|fragment| request.url.contains(fragment.as_str()));
        self.submitted.lock().push(request.clone());
        if fails {
            return Err(ReaperError::Sink(format!("rejected {}", request.url)));
        }
        Ok(DownloadId(self.next.fetch_add(1, Ordering::SeqCst) as u64 + 1))
    }
}
