//! 批次输入解析
//!
//! 支持两种格式：扫描器导出的 `ScanItem` JSON 数组，或每行一个链接的纯文本
//! (`#` 开头的行与空行忽略)。

use std::path::Path;

use crate::core::error::Result;
use crate::core::model::{ScanItem, ViewerLink};

/// 解析输入内容为按序编号的批次
pub fn parse_batch(content: &str) -> Result<Vec<ViewerLink>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let items: Vec<ScanItem> = serde_json::from_str(trimmed)?;
        return Ok(ViewerLink::from_scan(items));
    }

    Ok(ViewerLink::batch(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#')),
    ))
}

pub async fn load_batch(path: &Path) -> Result<Vec<ViewerLink>> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_batch(&content)
}
