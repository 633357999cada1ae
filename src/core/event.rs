//! 事件系统定义
//!
//! 用于调度器与 UI 之间的完全解耦通信

use flume::{Receiver, Sender};

use crate::core::model::{BatchProgress, TaskState};

/// Reaper 事件类型
#[derive(Debug, Clone)]
pub enum ReaperEvent {
    /// 批次开始
    BatchStarted { total: usize, concurrency: usize },

    /// 单项状态迁移
    TaskState {
        index: usize,
        url: String,
        state: TaskState,
    },

    /// 单项下载成功
    TaskSucceeded { index: usize, save_path: String },

    /// 单项失败
    TaskFailed {
        index: usize,
        url: String,
        error: String,
    },

    /// 聚合进度刷新
    Progress(BatchProgress),

    /// 批次结束，最终进度满足 completed == total
    BatchCompleted(BatchProgress),
}

/// 事件发送器
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<ReaperEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<ReaperEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件
    pub fn emit(&self, event: ReaperEvent) {
        let _ = self.tx.send(event);
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<ReaperEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<ReaperEvent>) -> Self {
        Self { rx }
    }

    /// 非阻塞接收事件
    pub fn try_recv(&self) -> Option<ReaperEvent> {
        self.rx.try_recv().ok()
    }

    /// 异步接收事件
    pub async fn recv_async(&self) -> Option<ReaperEvent> {
        self.rx.recv_async().await.ok()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
