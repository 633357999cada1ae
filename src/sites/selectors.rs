//! 站点选择器
//!
//! 预编译的 CSS 选择器与各站点的主图定位规则

use std::sync::OnceLock;

use scraper::{Html, Selector};
use url::Url;

use crate::utils::to_absolute_url;

/// 元数据回退：选择器 + 取值属性
pub struct Fallback {
    pub selector: Selector,
    pub attr: &'static str,
}

/// 单站点的主图定位规则
///
/// 按声明顺序尝试主选择器 (`src`)，全部缺失时再尝试元数据回退。
pub struct ImageRule {
    pub primary: Vec<Selector>,
    pub fallbacks: Vec<Fallback>,
}

impl ImageRule {
    fn new(primary: &[&str], fallbacks: &[(&str, &'static str)]) -> Self {
        Self {
            primary: primary.iter().map(|s| compile(s)).collect(),
            fallbacks: fallbacks
                .iter()
                .map(|&(s, attr)| Fallback {
                    selector: compile(s),
                    attr,
                })
                .collect(),
        }
    }

    /// 在文档中定位直链并补全为绝对地址
    pub fn find(&self, doc: &Html, base: &Url) -> Option<String> {
        let primary = self.primary.iter().find_map(|selector| {
            doc.select(selector)
                .filter_map(|el| el.value().attr("src"))
                .find(|src| !src.trim().is_empty())
        });

        let found = primary.or_else(|| {
            self.fallbacks.iter().find_map(|fb| {
                doc.select(&fb.selector)
                    .filter_map(|el| el.value().attr(fb.attr))
                    .find(|v| !v.trim().is_empty())
            })
        })?;

        Some(to_absolute_url(base, found)).filter(|u| !u.is_empty())
    }
}

/// 站点选择器集合
pub struct SiteSelectors {
    /// 中间页"继续"链接
    pub interstitial_continue: Selector,
    pub pixhost: ImageRule,
    pub imagebam: ImageRule,
    pub imgbox: ImageRule,
    pub imagevenue: ImageRule,
    pub turboimagehost: ImageRule,
    pub pimpandhost: ImageRule,
    pub postimg: ImageRule,
}

static SELECTORS: OnceLock<SiteSelectors> = OnceLock::new();

const OG_IMAGE: (&str, &str) = ("meta[property='og:image']", "content");
const IMAGE_SRC_LINK: (&str, &str) = ("link[rel='image_src']", "href");

fn compile(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

impl SiteSelectors {
    /// 获取全局选择器实例
    pub fn get() -> &'static SiteSelectors {
        SELECTORS.get_or_init(|| SiteSelectors {
            interstitial_continue: compile("#continue a[data-shown='inter']"),
            pixhost: ImageRule::new(&["img#image"], &[OG_IMAGE]),
            imagebam: ImageRule::new(
                &["#imageContainer img", ".main-image", "img#mainImage"],
                &[OG_IMAGE],
            ),
            imgbox: ImageRule::new(&["img.img", "img#img"], &[OG_IMAGE]),
            imagevenue: ImageRule::new(&["img#thepic", "#main-image"], &[OG_IMAGE]),
            turboimagehost: ImageRule::new(&["img#imageid"], &[OG_IMAGE]),
            pimpandhost: ImageRule::new(
                &[".main-image-wrapper img", "img.original"],
                &[OG_IMAGE, IMAGE_SRC_LINK],
            ),
            postimg: ImageRule::new(&["img#main-image"], &[OG_IMAGE]),
        })
    }
}
