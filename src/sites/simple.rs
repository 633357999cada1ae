use tracing::debug;

use super::StrategyContext;
use super::selectors::ImageRule;
use crate::core::error::{ReaperError, Result};
use crate::interfaces::Page;

/// 简单策略：取页 -> 主选择器 -> 元数据回退 -> 失败
pub async fn resolve(viewer_url: &str, rule: &ImageRule, ctx: &StrategyContext) -> Result<String> {
    let page = ctx.fetcher.fetch(viewer_url).await?;
    locate(&page, rule).ok_or_else(|| ReaperError::ElementNotFound(page.url.to_string()))
}

/// 同步解析，`Html` 不跨越挂起点
pub(crate) fn locate(page: &Page, rule: &ImageRule) -> Option<String> {
    let doc = page.document();
    let found = rule.find(&doc, &page.url);
    debug!("Locate on {} -> {:?}", page.url, found);
    found
}
