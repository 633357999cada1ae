//! 批次运行时上下文 (Batch Runtime Context)
//!
//! 维护工作者之间共享的待处理队列与任务表。二者是批次内仅有的共享可变状态，
//! 只在同步临界区内访问，锁从不跨越 `.await`。

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::coordinator::Coordinator;
use crate::core::event::{EventSender, ReaperEvent};
use crate::core::model::{BatchProgress, DownloadTask, ViewerLink};
use crate::interfaces::DownloadSink;
use crate::sites::LinkResolver;
use crate::utils::{build_save_path, ordinal_prefix};

pub struct BatchContext {
    pub resolver: Arc<LinkResolver>,
    pub sink: Arc<dyn DownloadSink>,
    coordinator: Coordinator,
    events: Option<EventSender>,
    folder: String,
    prefix: String,
    /// 按发现顺序排队的序号
    queue: Mutex<VecDeque<usize>>,
    /// 以序号为下标的任务表
    tasks: Mutex<Vec<DownloadTask>>,
}

impl BatchContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        links: Vec<ViewerLink>,
        resolver: Arc<LinkResolver>,
        sink: Arc<dyn DownloadSink>,
        coordinator: Coordinator,
        events: Option<EventSender>,
        folder: &str,
        prefix: &str,
    ) -> Self {
        let mut tasks: Vec<DownloadTask> = links.into_iter().map(DownloadTask::new).collect();
        tasks.sort_by_key(|t| t.link.ordinal_index);
        let queue = tasks.iter().map(|t| t.link.ordinal_index).collect();

        Self {
            resolver,
            sink,
            coordinator,
            events,
            folder: folder.to_string(),
            prefix: prefix.to_string(),
            queue: Mutex::new(queue),
            tasks: Mutex::new(tasks),
        }
    }

    pub fn total(&self) -> usize {
        self.tasks.lock().len()
    }

    /// 取出下一项；读取与移除在同一临界区内完成
    pub fn dequeue(&self) -> Option<ViewerLink> {
        let index = self.queue.lock().pop_front()?;
        self.tasks.lock().get(index).map(|t| t.link.clone())
    }

    /// 对任务执行状态迁移并广播
    pub fn transition<F>(&self, index: usize, f: F) -> bool
    where
        F: FnOnce(&mut DownloadTask) -> bool,
    {
        let event = {
            let mut tasks = self.tasks.lock();
            let Some(task) = tasks.get_mut(index) else {
                return false;
            };
            if !f(task) {
                return false;
            }
            ReaperEvent::TaskState {
                index,
                url: task.link.url.clone(),
                state: task.state,
            }
        };
        self.emit(event);
        true
    }

    /// 依据固定序号生成保存路径
    pub fn save_path_for(&self, index: usize, direct_url: &str) -> String {
        let prefix = format!("{}{}", self.prefix, ordinal_prefix(index, self.total()));
        build_save_path(direct_url, &self.folder, &prefix)
    }

    /// 即时推导聚合进度
    pub fn progress(&self) -> BatchProgress {
        BatchProgress::from_tasks(&self.tasks.lock())
    }

    pub fn snapshot(&self) -> Vec<DownloadTask> {
        self.tasks.lock().clone()
    }

    /// 重新计算并广播进度
    pub fn publish_progress(&self) -> BatchProgress {
        let progress = self.progress();
        self.coordinator.publish(progress);
        self.emit(ReaperEvent::Progress(progress));
        progress
    }

    /// 将所有未到终态的任务标记失败，返回受影响数量
    pub fn fail_unfinished(&self, reason: &str) -> usize {
        let mut tasks = self.tasks.lock();
        tasks
            .iter_mut()
            .filter(|t| !t.state.is_terminal())
            .map(|t| t.fail(reason))
            .filter(|changed| *changed)
            .count()
    }

    pub fn emit(&self, event: ReaperEvent) {
        if let Some(ref sender) = self.events {
            sender.emit(event);
        }
    }
}
