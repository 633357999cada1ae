//! 任务单元定义

use tracing::{debug, info, warn};

use crate::core::event::ReaperEvent;
use crate::core::model::{ResolutionOutcome, ViewerLink};
use crate::interfaces::DownloadRequest;
use crate::sites::extract_host;

use super::context::BatchContext;

/// 单个链接的处理流程：解析 -> 构建路径 -> 提交下载
#[derive(Debug, Clone)]
pub struct Job {
    link: ViewerLink,
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} ({})", self.link.ordinal_index, self.link.url)
    }
}

impl Job {
    pub fn new(link: ViewerLink) -> Self {
        Self { link }
    }

    /// 执行任务，结束时任务必然处于终态
    pub async fn run(self, ctx: &BatchContext) {
        let index = self.link.ordinal_index;
        ctx.transition(index, |t| t.begin_resolving());
        debug!("开始解析 {}", self);

        let direct_url = match ctx.resolver.resolve(&self.link.url).await {
            ResolutionOutcome::Resolved { direct_url } => direct_url,
            ResolutionOutcome::NoStrategy => {
                let host = extract_host(&self.link.url).unwrap_or_default();
                return self.fail(ctx, format!("no strategy for host {}", host));
            }
            ResolutionOutcome::Failed { reason } => return self.fail(ctx, reason),
        };

        ctx.transition(index, |t| t.mark_resolved(direct_url.clone()));

        let save_path = ctx.save_path_for(index, &direct_url);
        ctx.transition(index, |t| t.begin_downloading(save_path.clone()));

        let request = DownloadRequest {
            url: direct_url,
            filename: save_path.clone(),
            referer: Some(self.link.url.clone()),
        };

        match ctx.sink.submit(request).await {
            Ok(id) => {
                ctx.transition(index, |t| t.succeed());
                info!("[{}/{}] 下载完成 {} -> {}", index, ctx.total(), id, save_path);
                ctx.emit(ReaperEvent::TaskSucceeded { index, save_path });
                ctx.publish_progress();
            }
            Err(e) => self.fail(ctx, e.to_string()),
        }
    }

    fn fail(&self, ctx: &BatchContext, reason: String) {
        let index = self.link.ordinal_index;
        warn!("任务失败 {}: {}", self, reason);
        ctx.transition(index, |t| t.fail(reason.clone()));
        ctx.emit(ReaperEvent::TaskFailed {
            index,
            url: self.link.url.clone(),
            error: reason,
        });
        ctx.publish_progress();
    }
}
