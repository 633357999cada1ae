//! 批量下载调度器
//!
//! 负责批次的生命周期：校验 -> 占用执行权 -> 工作者池执行 -> 收尾汇总

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::coordinator::Coordinator;
use crate::core::error::Result;
use crate::core::event::{EventSender, ReaperEvent};
use crate::core::model::{BatchProgress, BatchReport, ViewerLink};
use crate::interfaces::DownloadSink;
use crate::sites::LinkResolver;

use super::context::BatchContext;
use super::task::Job;

/// 下载调度器
pub struct DownloadScheduler {
    resolver: Arc<LinkResolver>,
    sink: Arc<dyn DownloadSink>,
    coordinator: Coordinator,
    events: Option<EventSender>,
}

impl DownloadScheduler {
    pub fn new(resolver: Arc<LinkResolver>, sink: Arc<dyn DownloadSink>) -> Self {
        Self {
            resolver,
            sink,
            coordinator: Coordinator::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// 当前批次的进度快照
    pub fn progress(&self) -> BatchProgress {
        self.coordinator.progress()
    }

    /// 订阅进度流
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.coordinator.subscribe()
    }

    /// 执行一个批次
    ///
    /// 同一调度器上已有批次在执行时返回 `BatchInFlight`。返回时每个任务都处于终态，
    /// 且最终进度满足 `completed == total`。
    pub async fn run(
        &self,
        links: Vec<ViewerLink>,
        folder: &str,
        prefix: &str,
        concurrency: usize,
    ) -> Result<BatchReport> {
        ViewerLink::validate_batch(&links)?;
        let _guard = self.coordinator.try_begin(links.len())?;

        let total = links.len();
        let concurrency = concurrency.max(1);
        let ctx = Arc::new(BatchContext::new(
            links,
            self.resolver.clone(),
            self.sink.clone(),
            self.coordinator.clone(),
            self.events.clone(),
            folder,
            prefix,
        ));

        ctx.emit(ReaperEvent::BatchStarted { total, concurrency });
        info!("批次开始: {} 项, 并发 {}", total, concurrency);

        let mut join_set = JoinSet::new();
        for id in 0..concurrency.min(total) {
            join_set.spawn(worker(id, ctx.clone()));
        }

        while let Some(res) = join_set.join_next().await {
            if let Err(e) = res {
                error!("工作者异常退出: {}", e);
            }
        }

        // 工作者异常退出时可能遗留未完成的任务
        let orphaned = ctx.fail_unfinished("worker exited before finishing the item");
        if orphaned > 0 {
            warn!("{} 个任务因工作者退出被标记失败", orphaned);
        }

        let progress = ctx.progress();
        self.coordinator.publish(progress);
        ctx.emit(ReaperEvent::BatchCompleted(progress));
        info!("批次结束: {}", progress);

        Ok(BatchReport {
            progress,
            tasks: ctx.snapshot(),
        })
    }
}

/// 工作者循环：队列为空时退出
async fn worker(id: usize, ctx: Arc<BatchContext>) -> usize {
    let mut handled = 0;
    while let Some(link) = ctx.dequeue() {
        Job::new(link).run(&ctx).await;
        handled += 1;
    }
    debug!("Worker {} idle after {} item(s)", id, handled);
    handled
}
