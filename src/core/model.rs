use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::core::error::{ReaperError, Result};

/// 页面扫描器产出的候选记录
///
/// 只消费 `url` 与 `index`，其余字段保留以便原样透传。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    pub index: usize,
}

/// 批次中的一个查看页链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerLink {
    pub url: String,
    /// 发现顺序序号，批次创建后不再改变
    pub ordinal_index: usize,
}

impl ViewerLink {
    pub fn new(url: impl Into<String>, ordinal_index: usize) -> Self {
        Self {
            url: url.into(),
            ordinal_index,
        }
    }

    /// 按给定顺序编号
    pub fn batch<I, S>(urls: I) -> Vec<ViewerLink>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(i, url)| ViewerLink::new(url, i))
            .collect()
    }

    /// 按扫描序号稳定排序后重新编号为 `[0, N)`
    pub fn from_scan(mut items: Vec<ScanItem>) -> Vec<ViewerLink> {
        items.sort_by_key(|item| item.index);
        Self::batch(items.into_iter().map(|item| item.url))
    }

    /// 校验序号集合恰为 `[0, N)` 且无重复
    pub fn validate_batch(links: &[ViewerLink]) -> Result<()> {
        let mut seen = HashSet::with_capacity(links.len());
        for link in links {
            if link.ordinal_index >= links.len() {
                return Err(ReaperError::InvalidBatch(format!(
                    "ordinal {} out of range for {} links",
                    link.ordinal_index,
                    links.len()
                )));
            }
            if !seen.insert(link.ordinal_index) {
                return Err(ReaperError::InvalidBatch(format!(
                    "duplicate ordinal {}",
                    link.ordinal_index
                )));
            }
        }
        Ok(())
    }
}

/// 单个链接的解析结果，产生后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved { direct_url: String },
    NoStrategy,
    Failed { reason: String },
}

impl ResolutionOutcome {
    pub fn direct_url(&self) -> Option<&str> {
        match self {
            ResolutionOutcome::Resolved { direct_url } => Some(direct_url),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionOutcome::Resolved { direct_url } => write!(f, "Resolved({})", direct_url),
            ResolutionOutcome::NoStrategy => write!(f, "NoStrategy"),
            ResolutionOutcome::Failed { reason } => write!(f, "Failed({})", reason),
        }
    }
}

/// 任务状态
///
/// 声明顺序即推进顺序，只允许向后迁移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr)]
pub enum TaskState {
    Pending,
    Resolving,
    Resolved,
    Downloading,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            TaskState::Resolving | TaskState::Resolved | TaskState::Downloading
        )
    }
}

/// 调度器独占的单项下载记录
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub link: ViewerLink,
    pub state: TaskState,
    pub direct_url: Option<String>,
    pub save_path: Option<String>,
    pub error: Option<String>,
}

impl DownloadTask {
    pub fn new(link: ViewerLink) -> Self {
        Self {
            link,
            state: TaskState::Pending,
            direct_url: None,
            save_path: None,
            error: None,
        }
    }

    /// 单调推进；终态之后或逆向迁移一律拒绝
    fn advance(&mut self, next: TaskState) -> bool {
        if self.state.is_terminal() || next <= self.state {
            tracing::warn!(
                "拒绝状态回退 #{}: {} -> {}",
                self.link.ordinal_index,
                self.state,
                next
            );
            return false;
        }
        self.state = next;
        true
    }

    pub fn begin_resolving(&mut self) -> bool {
        self.advance(TaskState::Resolving)
    }

    pub fn mark_resolved(&mut self, direct_url: String) -> bool {
        let ok = self.advance(TaskState::Resolved);
        if ok {
            self.direct_url = Some(direct_url);
        }
        ok
    }

    pub fn begin_downloading(&mut self, save_path: String) -> bool {
        let ok = self.advance(TaskState::Downloading);
        if ok {
            self.save_path = Some(save_path);
        }
        ok
    }

    pub fn succeed(&mut self) -> bool {
        self.advance(TaskState::Succeeded)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        let ok = self.advance(TaskState::Failed);
        if ok {
            self.error = Some(reason.into());
        }
        ok
    }
}

/// 批次聚合进度，始终由任务集合即时推导
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchProgress {
    pub fn from_tasks(tasks: &[DownloadTask]) -> Self {
        let (succeeded, failed) = tasks.iter().fold((0, 0), |(s, f), t| match t.state {
            TaskState::Succeeded => (s + 1, f),
            TaskState::Failed => (s, f + 1),
            _ => (s, f),
        });
        Self {
            total: tasks.len(),
            completed: succeeded + failed,
            succeeded,
            failed,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

impl std::fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} (ok {}, failed {})",
            self.completed, self.total, self.succeeded, self.failed
        )
    }
}

/// 批次执行报告
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub progress: BatchProgress,
    pub tasks: Vec<DownloadTask>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &DownloadTask> {
        self.tasks.iter().filter(|t| t.state == TaskState::Failed)
    }
}
