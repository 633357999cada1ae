//! 保存路径构建 (Save Path Builder)
//!
//! 直链 + 目录 + 前缀 -> 经过文件系统清洗的相对路径。永不失败。

use percent_encoding::percent_decode_str;
use tracing::warn;
use url::Url;

/// 认可的图片扩展名 (不区分大小写)
pub const ACCEPTED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff"];

const DEFAULT_EXTENSION: &str = "jpg";
const FALLBACK_NAME: &str = "image";

/// 最严格目标文件系统 (NTFS) 上的非法字符
const ILLEGAL_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows 保留设备名
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// 构建相对保存路径
pub fn build_save_path(direct_url: &str, folder: &str, prefix: &str) -> String {
    let filename = match Url::parse(direct_url) {
        Ok(url) => sanitize_component(&format!("{}{}", prefix, url_filename(&url))),
        Err(e) => {
            warn!("构建保存路径失败 {}: {}", direct_url, e);
            return sanitize_component(&format!("{}{}.{}", prefix, FALLBACK_NAME, DEFAULT_EXTENSION));
        }
    };

    let folder = sanitize_folder(folder);
    if folder.is_empty() {
        filename
    } else {
        format!("{}/{}", folder, filename)
    }
}

/// 零填充序号前缀，宽度等于批次规模的位数
pub fn ordinal_prefix(index: usize, total: usize) -> String {
    let width = total.max(1).to_string().len();
    format!("{:0width$}_", index, width = width)
}

/// 取路径最后一段，限制字符集并保证扩展名
fn url_filename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let decoded = percent_decode_str(segment).decode_utf8_lossy();

    let mut name: String = decoded
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() {
        name.push_str(FALLBACK_NAME);
    }
    if !has_accepted_extension(&name) {
        name.push('.');
        name.push_str(DEFAULT_EXTENSION);
    }
    name
}

fn has_accepted_extension(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        ACCEPTED_EXTENSIONS
            .iter()
            .any(|accepted| ext.eq_ignore_ascii_case(accepted))
    })
}

/// 单个路径组件的文件系统清洗
fn sanitize_component(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_end_matches(['.', ' ']);

    let stem = trimmed.split('.').next().unwrap_or_default();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
    {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// 目录逐段清洗，保留层级，丢弃空段与 `.`/`..`
fn sanitize_folder(folder: &str) -> String {
    folder
        .split(['/', '\\'])
        .map(sanitize_component)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filename_of(path: &str) -> &str {
        path.rsplit('/').next().unwrap()
    }

    #[test]
    fn query_is_dropped_and_extension_defaulted() {
        let path = build_save_path("https://x.com/a?b=1", "My/Folder", "");
        assert_eq!(path, "My/Folder/a.jpg");
        assert!(!path.contains('?'));
        let name = filename_of(&path);
        assert!(!name.contains('/'));
        assert!(has_accepted_extension(name));
    }

    #[test]
    fn angle_brackets_never_survive() {
        let path = build_save_path("https://x.com/weird<>name.png", "ImageReaper", "");
        assert!(!path.contains('<'));
        assert!(!path.contains('>'));
        assert_eq!(path, "ImageReaper/weird__name.png");
    }

    #[test]
    fn existing_extension_is_kept_case_insensitively() {
        assert_eq!(
            build_save_path("https://img1.pixhost.to/images/1/Pic.JPEG", "", ""),
            "Pic.JPEG"
        );
        assert_eq!(
            build_save_path("https://x.com/photo.webp#frag", "out", "p_"),
            "out/p_photo.webp"
        );
    }

    #[test]
    fn percent_encoded_segment_is_decoded_before_filtering() {
        assert_eq!(
            build_save_path("https://x.com/my%20holiday%20pic.gif", "f", ""),
            "f/my_holiday_pic.gif"
        );
    }

    #[test]
    fn empty_segment_falls_back_to_image() {
        assert_eq!(build_save_path("https://x.com/", "f", "01_"), "f/01_image.jpg");
    }

    #[test]
    fn unparseable_url_falls_back_to_prefixed_image() {
        assert_eq!(build_save_path("not a url", "folder", "pre_"), "pre_image.jpg");
        assert_eq!(build_save_path("", "folder", ""), "image.jpg");
    }

    #[test]
    fn prefix_is_sanitized_with_filename() {
        let path = build_save_path("https://x.com/a.png", "f", "bad:pre|fix ");
        assert_eq!(path, "f/bad_pre_fix a.png");
    }

    #[test]
    fn folder_is_sanitized_per_segment() {
        assert_eq!(
            build_save_path("https://x.com/a.png", "My<Folder>/sub. /../", ""),
            "My_Folder_/sub/a.png"
        );
        assert_eq!(build_save_path("https://x.com/a.png", "Pics\\2024//", ""), "Pics/2024/a.png");
    }

    #[test]
    fn reserved_device_names_are_escaped() {
        assert_eq!(build_save_path("https://x.com/con.jpg", "", ""), "_con.jpg");
        assert_eq!(build_save_path("https://x.com/a.jpg", "AUX/nul", ""), "_AUX/_nul/a.jpg");
        assert_eq!(build_save_path("https://x.com/console.jpg", "", ""), "console.jpg");
    }

    #[test]
    fn trailing_dots_and_spaces_are_stripped() {
        assert_eq!(sanitize_component("name. . "), "name");
        assert_eq!(sanitize_folder("dir.../"), "dir");
    }

    #[test]
    fn ordinal_width_follows_batch_size() {
        assert_eq!(ordinal_prefix(3, 12), "03_");
        assert_eq!(ordinal_prefix(0, 9), "0_");
        assert_eq!(ordinal_prefix(42, 100), "042_");
        assert_eq!(ordinal_prefix(0, 0), "0_");
    }

    #[test]
    fn ordinal_prefixes_sort_in_discovery_order() {
        let mut names: Vec<_> = (0..12)
            .rev()
            .map(|i| build_save_path("https://x.com/z.jpg", "f", &ordinal_prefix(i, 12)))
            .collect();
        names.sort();
        let order: Vec<usize> = names
            .iter()
            .map(|p| filename_of(p)[..2].parse().unwrap())
            .collect();
        assert_eq!(order, (0..12).collect::<Vec<_>>());
    }
}
