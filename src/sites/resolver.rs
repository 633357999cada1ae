//! 链接解析分发器 (Link Resolver)
//!
//! 负责主机提取、策略选择与结果归一化。任何输入都只会得到一个 `ResolutionOutcome`，
//! 策略内部的错误乃至 panic 都不会越过分发边界。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, warn};
use url::Url;

use super::{SiteRegistry, StrategyContext};
use crate::core::config::ResolverConfig;
use crate::core::error::{ReaperError, Result};
use crate::core::model::ResolutionOutcome;
use crate::interfaces::{CookieChannel, PageFetcher};

pub struct LinkResolver {
    registry: SiteRegistry,
    ctx: StrategyContext,
}

impl LinkResolver {
    pub fn new(
        registry: SiteRegistry,
        fetcher: Arc<dyn PageFetcher>,
        cookies: Arc<dyn CookieChannel>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            registry,
            ctx: StrategyContext::new(fetcher, cookies, config),
        }
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// 解析查看页链接
    pub async fn resolve(&self, viewer_url: &str) -> ResolutionOutcome {
        let host = match extract_host(viewer_url) {
            Ok(host) => host,
            Err(e) => {
                warn!("无法解析链接 {:?}: {}", viewer_url, e);
                return ResolutionOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let Some((key, strategy)) = self.registry.lookup(&host) else {
            debug!("No strategy for host: {}", host);
            return ResolutionOutcome::NoStrategy;
        };

        let attempt = AssertUnwindSafe(strategy.resolve(viewer_url, &self.ctx)).catch_unwind();
        match attempt.await {
            Ok(Ok(direct_url)) => {
                info!("Resolved [{}] {} -> {}", key, viewer_url, direct_url);
                ResolutionOutcome::Resolved { direct_url }
            }
            Ok(Err(e)) => {
                warn!("Resolver failed [{}] {}: {}", key, viewer_url, e);
                ResolutionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                warn!("Resolver panicked [{}] {}", key, viewer_url);
                ResolutionOutcome::Failed {
                    reason: format!("{} strategy panicked", strategy),
                }
            }
        }
    }
}

/// 提取主机名并去掉开头的 `www.`
pub fn extract_host(viewer_url: &str) -> Result<String> {
    let url = Url::parse(viewer_url.trim()).map_err(|e| ReaperError::InvalidUrl(format!("{viewer_url:?}: {e}")))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ReaperError::InvalidUrl(format!("{viewer_url:?}: no host")))?;
    let host = host.to_ascii_lowercase();
    Ok(host
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(host))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::interfaces::mock::{CookieMode, FakeCookies, FakeFetcher};
    use crate::sites::HostStrategy;

    const BAM_VIEW: &str = "https://www.imagebam.com/view/ME1234";
    const BAM_CONTINUE: &str = "https://www.imagebam.com/view/ME1234?continue=1";

    fn interstitial_page() -> String {
        format!(
            r#"<html><div id="continue"><a data-shown="inter" href="{}">Continue to image</a></div></html>"#,
            "/view/ME1234?continue=1"
        )
    }

    fn bam_image_page() -> &'static str {
        r#"<html><div id="imageContainer"><img src="https://images4.imagebam.com/ab/cd/full.jpg"></div></html>"#
    }

    fn resolver_with(fetcher: FakeFetcher, cookies: Arc<FakeCookies>, config: ResolverConfig) -> (LinkResolver, Arc<FakeFetcher>) {
        let fetcher = Arc::new(fetcher);
        let resolver = LinkResolver::new(SiteRegistry::new(), fetcher.clone(), cookies, config);
        (resolver, fetcher)
    }

    fn resolver(fetcher: FakeFetcher) -> (LinkResolver, Arc<FakeFetcher>) {
        resolver_with(fetcher, FakeCookies::new(CookieMode::Confirm), ResolverConfig::default())
    }

    #[test]
    fn host_extraction_strips_www() {
        assert_eq!(extract_host("https://www.imagebam.com/view/x").unwrap(), "imagebam.com");
        assert_eq!(extract_host("https://CDN.ImageBam.com/x").unwrap(), "cdn.imagebam.com");
        assert_eq!(extract_host("https://wwwx.com/").unwrap(), "wwwx.com");
        assert!(matches!(extract_host(""), Err(ReaperError::InvalidUrl(_))));
        assert!(extract_host("data:image/png;base64,AAAA").is_err());
        assert!(extract_host("/relative/path.jpg").is_err());
    }

    #[tokio::test]
    async fn any_string_yields_an_outcome() {
        let (resolver, fetcher) = resolver(FakeFetcher::new());
        for input in ["", "   ", "not a url", "data:image/png;base64,AAAA", "mailto:a@b.c", "https://"] {
            let outcome = resolver.resolve(input).await;
            assert!(
                matches!(outcome, ResolutionOutcome::Failed { .. }),
                "{input:?} -> {outcome}"
            );
        }
        assert_eq!(fetcher.count(), 0);
    }

    #[tokio::test]
    async fn unknown_host_is_no_strategy() {
        let (resolver, fetcher) = resolver(FakeFetcher::new());
        assert_eq!(
            resolver.resolve("https://notimagebam.com/view/1").await,
            ResolutionOutcome::NoStrategy
        );
        assert_eq!(fetcher.count(), 0);
    }

    #[tokio::test]
    async fn subdomains_select_the_registered_strategy() {
        let fetcher = FakeFetcher::new().with_fallback(|_| Ok(bam_image_page().to_string()));
        let (resolver, _) = resolver(fetcher);
        for url in [
            "https://imagebam.com/view/A",
            "https://www.imagebam.com/view/A",
            "https://cdn.imagebam.com/view/A",
        ] {
            assert_eq!(
                resolver.resolve(url).await.direct_url(),
                Some("https://images4.imagebam.com/ab/cd/full.jpg"),
                "{url}"
            );
        }
    }

    #[tokio::test]
    async fn pixhost_primary_selector() {
        let fetcher = FakeFetcher::new().page(
            "https://pixhost.to/show/12/345_pic.jpg",
            r#"<img id="image" class="image-img" src="https://img12.pixhost.to/images/12/345_pic.jpg">"#,
        );
        let (resolver, _) = resolver(fetcher);
        assert_eq!(
            resolver.resolve("https://pixhost.to/show/12/345_pic.jpg").await,
            ResolutionOutcome::Resolved {
                direct_url: "https://img12.pixhost.to/images/12/345_pic.jpg".into()
            }
        );
    }

    #[tokio::test]
    async fn simple_strategy_uses_meta_fallback_then_fails() {
        let fetcher = FakeFetcher::new()
            .page(
                "https://postimg.cc/abc",
                r#"<meta property="og:image" content="https://i.postimg.cc/abc/x.png">"#,
            )
            .page("https://imgbox.com/zzz", "<html><body>removed</body></html>");
        let (resolver, _) = resolver(fetcher);

        assert_eq!(
            resolver.resolve("https://postimg.cc/abc").await.direct_url(),
            Some("https://i.postimg.cc/abc/x.png")
        );
        assert!(matches!(
            resolver.resolve("https://imgbox.com/zzz").await,
            ResolutionOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn simple_strategy_does_not_retry_fetch_failures() {
        let fetcher = FakeFetcher::new().status("https://imagevenue.com/ME1", 503);
        let (resolver, fetcher) = resolver(fetcher);
        let outcome = resolver.resolve("https://imagevenue.com/ME1").await;
        assert!(matches!(outcome, ResolutionOutcome::Failed { reason } if reason.contains("503")));
        assert_eq!(fetcher.count(), 1);
    }

    #[tokio::test]
    async fn interstitial_is_followed_after_cookie() {
        let fetcher = FakeFetcher::new()
            .page(BAM_VIEW, &interstitial_page())
            .page(BAM_CONTINUE, bam_image_page());
        let cookies = FakeCookies::new(CookieMode::Confirm);
        let (resolver, fetcher) = resolver_with(fetcher, cookies.clone(), ResolverConfig::default());

        assert_eq!(
            resolver.resolve(BAM_VIEW).await.direct_url(),
            Some("https://images4.imagebam.com/ab/cd/full.jpg")
        );
        assert_eq!(cookies.count(), 1);
        assert_eq!(*fetcher.log.lock(), vec![BAM_VIEW.to_string(), BAM_CONTINUE.to_string()]);
    }

    #[tokio::test]
    async fn interstitial_on_every_fetch_stops_after_two_follows() {
        let fetcher = FakeFetcher::new().with_fallback(|_| Ok(interstitial_page()));
        let cookies = FakeCookies::new(CookieMode::Confirm);
        let (resolver, fetcher) = resolver_with(fetcher, cookies.clone(), ResolverConfig::default());

        let outcome = resolver.resolve(BAM_VIEW).await;
        assert!(
            matches!(&outcome, ResolutionOutcome::Failed { reason } if reason.contains("2 follow")),
            "{outcome}"
        );
        assert_eq!(fetcher.count(), 3);
        assert_eq!(cookies.count(), 2);
    }

    #[tokio::test]
    async fn cookie_timeout_is_only_a_warning() {
        let fetcher = FakeFetcher::new()
            .page(BAM_VIEW, &interstitial_page())
            .page(BAM_CONTINUE, bam_image_page());
        let cookies = FakeCookies::new(CookieMode::Hang);
        let config = ResolverConfig::builder().cookie_timeout_ms(50).build();
        let (resolver, _) = resolver_with(fetcher, cookies.clone(), config);

        let started = std::time::Instant::now();
        let outcome = resolver.resolve(BAM_VIEW).await;
        assert!(outcome.direct_url().is_some(), "{outcome}");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(cookies.count(), 1);
    }

    #[tokio::test]
    async fn rejected_cookie_still_continues() {
        let fetcher = FakeFetcher::new()
            .page(BAM_VIEW, &interstitial_page())
            .page(BAM_CONTINUE, bam_image_page());
        let (resolver, _) = resolver_with(
            fetcher,
            FakeCookies::new(CookieMode::Reject),
            ResolverConfig::default(),
        );
        assert!(resolver.resolve(BAM_VIEW).await.direct_url().is_some());
    }

    #[tokio::test]
    async fn interstitial_strategy_retries_fetch_failures_within_bound() {
        let fetcher = FakeFetcher::new().status(BAM_VIEW, 502);
        let (resolver, fetcher) = resolver(fetcher);
        let outcome = resolver.resolve(BAM_VIEW).await;
        assert!(matches!(&outcome, ResolutionOutcome::Failed { reason } if reason.contains("502")));
        assert_eq!(fetcher.count(), 3);
    }

    #[tokio::test]
    async fn strategy_timeout_becomes_failure() {
        let fetcher = FakeFetcher::new()
            .page("https://pixhost.to/show/slow", r#"<img id="image" src="/a.jpg">"#)
            .with_delay(|_| Duration::from_secs(5));
        let config = ResolverConfig::builder().strategy_timeout_secs(0).build();
        let (resolver, _) = resolver_with(fetcher, FakeCookies::new(CookieMode::Confirm), config);

        let outcome = resolver.resolve("https://pixhost.to/show/slow").await;
        assert!(matches!(&outcome, ResolutionOutcome::Failed { reason } if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn relative_image_is_made_absolute_against_page() {
        let fetcher = FakeFetcher::new().page(
            "https://www.turboimagehost.com/p/1/a.jpg.html",
            r#"<img id="imageid" src="//s1.turboimagehost.com/sp/1/a.jpg">"#,
        );
        let (resolver, _) = resolver(fetcher);
        assert_eq!(
            resolver
                .resolve("https://www.turboimagehost.com/p/1/a.jpg.html")
                .await
                .direct_url(),
            Some("https://s1.turboimagehost.com/sp/1/a.jpg")
        );
        assert!(resolver.registry().lookup("turboimagehost.com").is_some_and(|(_, s)| s == HostStrategy::TurboImageHost));
    }
}
