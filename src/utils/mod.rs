use url::Url;

pub mod filename;
pub mod input;

pub use filename::{build_save_path, ordinal_prefix};
pub use input::{load_batch, parse_batch};

/// 将页面中的相对/协议相对链接补全为绝对地址
pub fn to_absolute_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }

    if let Some(path_without_slashes) = href.strip_prefix("//") {
        return format!("{}://{}", base.scheme(), path_without_slashes);
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
