//! 中间页绕过状态机 (Interstitial Bypass)
//!
//! `Fetching -> InterstitialCheck -> Retrying(n) -> Succeeded | Exhausted`
//!
//! 跟随次数 `n` 在每次重试前检查，上限为 `max_interstitial_follows`。
//! 取页失败与遇到中间页共用同一个计数。

use std::time::Duration;

use tracing::{debug, info, warn};

use super::StrategyContext;
use super::selectors::{ImageRule, SiteSelectors};
use crate::core::error::{ReaperError, Result};
use crate::interfaces::{CookieRequest, Page};
use crate::utils::to_absolute_url;

/// 重试原因
enum RetryReason {
    /// 遇到中间页，需先确认 Cookie
    Interstitial,
    /// 取页失败，保留最后一次错误
    FetchError(ReaperError),
}

enum BypassState {
    Fetching { url: String },
    InterstitialCheck { page: Page },
    Retrying { url: String, attempt: u32, reason: RetryReason },
    Succeeded(String),
    Exhausted(ReaperError),
}

/// 页面检查结论
enum Inspection {
    Image(String),
    Interstitial(String),
    Missing,
}

const FETCH_BACKOFF: Duration = Duration::from_millis(250);

pub async fn resolve(
    viewer_url: &str,
    rule: &ImageRule,
    cookie: CookieRequest,
    ctx: &StrategyContext,
) -> Result<String> {
    let max_follows = ctx.config.max_interstitial_follows;
    let mut follows = 0u32;
    let mut state = BypassState::Fetching {
        url: viewer_url.to_string(),
    };

    loop {
        state = match state {
            BypassState::Fetching { url } => match ctx.fetcher.fetch(&url).await {
                Ok(page) => BypassState::InterstitialCheck { page },
                Err(e) if e.is_fetch_failure() => BypassState::Retrying {
                    url,
                    attempt: follows + 1,
                    reason: RetryReason::FetchError(e),
                },
                Err(e) => BypassState::Exhausted(e),
            },

            BypassState::InterstitialCheck { page } => match inspect(&page, rule) {
                Inspection::Image(direct) => BypassState::Succeeded(direct),
                Inspection::Missing => {
                    BypassState::Exhausted(ReaperError::ElementNotFound(page.url.to_string()))
                }
                Inspection::Interstitial(next) => {
                    info!("检测到中间页，准备跟随: {}", next);
                    BypassState::Retrying {
                        url: next,
                        attempt: follows + 1,
                        reason: RetryReason::Interstitial,
                    }
                }
            },

            BypassState::Retrying {
                url,
                attempt,
                reason,
            } => {
                if attempt > max_follows {
                    BypassState::Exhausted(match reason {
                        RetryReason::Interstitial => ReaperError::InterstitialExhausted {
                            url: viewer_url.to_string(),
                            follows,
                        },
                        RetryReason::FetchError(e) => e,
                    })
                } else {
                    match reason {
                        RetryReason::Interstitial => confirm_cookie(&cookie, ctx).await,
                        RetryReason::FetchError(e) => {
                            warn!("取页失败 (第 {}/{} 次重试): {}", attempt, max_follows, e);
                            tokio::time::sleep(FETCH_BACKOFF * attempt).await;
                        }
                    }
                    follows = attempt;
                    BypassState::Fetching { url }
                }
            }

            BypassState::Succeeded(direct) => {
                debug!("Interstitial strategy done after {} follow(s)", follows);
                return Ok(direct);
            }
            BypassState::Exhausted(e) => return Err(e),
        };
    }
}

/// 先判定中间页，再查找主图
fn inspect(page: &Page, rule: &ImageRule) -> Inspection {
    let doc = page.document();

    let continuation = doc
        .select(&SiteSelectors::get().interstitial_continue)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| to_absolute_url(&page.url, href))
        .find(|href| !href.is_empty());

    if let Some(next) = continuation {
        return Inspection::Interstitial(next);
    }

    match rule.find(&doc, &page.url) {
        Some(direct) => Inspection::Image(direct),
        None => Inspection::Missing,
    }
}

/// 通过旁路通道写入 Cookie，超时或未确认只告警，流程继续
async fn confirm_cookie(cookie: &CookieRequest, ctx: &StrategyContext) {
    let limit = ctx.cookie_timeout();
    match tokio::time::timeout(limit, ctx.cookies.set_cookie(cookie)).await {
        Ok(Ok(true)) => debug!("Cookie {} confirmed", cookie.name),
        Ok(Ok(false)) => warn!("Cookie {} 未确认，继续尝试", cookie.name),
        Ok(Err(e)) => warn!("Cookie {} 写入失败: {}，继续尝试", cookie.name, e),
        Err(_) => warn!("{} ({:?})，继续尝试", ReaperError::CookieTimeout(cookie.domain.clone()), limit),
    }
}
