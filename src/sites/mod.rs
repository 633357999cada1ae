//! 站点解析策略 (Host Resolution Strategies)
//!
//! 每个受支持的图床对应一个枚举变体；注册表以主机后缀为键映射到变体。
//! 新增站点 = 新增变体 + 一行注册，分发逻辑无需改动。

use std::sync::Arc;
use std::time::Duration;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::debug;

use crate::core::config::ResolverConfig;
use crate::core::error::{ReaperError, Result};
use crate::interfaces::{CookieChannel, CookieRequest, PageFetcher};

pub mod interstitial;
pub mod resolver;
pub mod selectors;
pub mod simple;

pub use resolver::{LinkResolver, extract_host};
pub use selectors::{ImageRule, SiteSelectors};

/// 策略执行上下文
///
/// 仅持有外部能力与配置，不保存任何跨调用状态。
#[derive(Clone)]
pub struct StrategyContext {
    pub fetcher: Arc<dyn PageFetcher>,
    pub cookies: Arc<dyn CookieChannel>,
    pub config: ResolverConfig,
}

impl StrategyContext {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        cookies: Arc<dyn CookieChannel>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            fetcher,
            cookies,
            config,
        }
    }

    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_secs(self.config.strategy_timeout_secs)
    }

    pub fn cookie_timeout(&self) -> Duration {
        Duration::from_millis(self.config.cookie_timeout_ms)
    }
}

/// 站点策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum HostStrategy {
    Pixhost,
    ImageBam,
    Imgbox,
    ImageVenue,
    TurboImageHost,
    PimpAndHost,
    PostImg,
}

impl HostStrategy {
    /// 注册用的主机后缀
    pub fn key(self) -> &'static str {
        match self {
            HostStrategy::Pixhost => "pixhost.to",
            HostStrategy::ImageBam => "imagebam.com",
            HostStrategy::Imgbox => "imgbox.com",
            HostStrategy::ImageVenue => "imagevenue.com",
            HostStrategy::TurboImageHost => "turboimagehost.com",
            HostStrategy::PimpAndHost => "pimpandhost.com",
            HostStrategy::PostImg => "postimg.cc",
        }
    }

    pub fn rule(self) -> &'static ImageRule {
        let s = SiteSelectors::get();
        match self {
            HostStrategy::Pixhost => &s.pixhost,
            HostStrategy::ImageBam => &s.imagebam,
            HostStrategy::Imgbox => &s.imgbox,
            HostStrategy::ImageVenue => &s.imagevenue,
            HostStrategy::TurboImageHost => &s.turboimagehost,
            HostStrategy::PimpAndHost => &s.pimpandhost,
            HostStrategy::PostImg => &s.postimg,
        }
    }

    /// 中间页确认所需的 Cookie；`None` 表示该站点走简单策略
    pub fn interstitial_cookie(self) -> Option<CookieRequest> {
        match self {
            HostStrategy::ImageBam => Some(CookieRequest {
                url: "https://www.imagebam.com/".into(),
                name: "nsfw_inter".into(),
                value: "1".into(),
                domain: ".imagebam.com".into(),
                path: "/".into(),
            }),
            _ => None,
        }
    }

    /// 解析查看页为直链，受 `strategy_timeout_secs` 约束
    pub async fn resolve(self, viewer_url: &str, ctx: &StrategyContext) -> Result<String> {
        let limit = ctx.strategy_timeout();
        tokio::time::timeout(limit, self.run(viewer_url, ctx))
            .await
            .map_err(|_| ReaperError::StrategyTimeout(limit))?
    }

    async fn run(self, viewer_url: &str, ctx: &StrategyContext) -> Result<String> {
        match self.interstitial_cookie() {
            Some(cookie) => {
                interstitial::resolve(viewer_url, self.rule(), cookie, ctx).await
            }
            None => simple::resolve(viewer_url, self.rule(), ctx).await,
        }
    }
}

// ============================================================================
// 站点注册表
// ============================================================================

/// 主机后缀 -> 策略
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    entries: Vec<(String, HostStrategy)>,
}

impl SiteRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 内置全部站点
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for strategy in HostStrategy::iter() {
            registry.register(strategy.key(), strategy);
        }
        registry
    }

    /// 注册或覆盖一个后缀
    pub fn register(&mut self, suffix: &str, strategy: HostStrategy) {
        let suffix = suffix.trim_start_matches('.').to_ascii_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == suffix) {
            Some(entry) => entry.1 = strategy,
            None => self.entries.push((suffix, strategy)),
        }
    }

    /// 按标签边界做后缀匹配，多个命中时取最长后缀
    pub fn lookup(&self, host: &str) -> Option<(&str, HostStrategy)> {
        let found = self
            .entries
            .iter()
            .filter(|(key, _)| suffix_matches(host, key))
            .max_by_key(|(key, _)| key.len())
            .map(|(key, strategy)| (key.as_str(), *strategy));
        debug!("Registry lookup {} -> {:?}", host, found);
        found
    }

    pub fn list(&self) -> Vec<(&str, HostStrategy)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), *s)).collect()
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn suffix_matches(host: &str, key: &str) -> bool {
    host == key
        || host
            .strip_suffix(key)
            .is_some_and(|rest| rest.ends_with('.'))
}
