//! 批次协调器 (Batch Coordinator)
//!
//! 利用 `tokio::sync::watch` 广播实时进度，配合 `Mutex` 保证同一时刻只有一个批次在执行。

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tracing::{debug, info};

use crate::core::error::{ReaperError, Result};
use crate::core::model::BatchProgress;

/// 批次协调器
#[derive(Clone)]
pub struct Coordinator {
    progress_tx: Arc<watch::Sender<BatchProgress>>,
    progress_rx: watch::Receiver<BatchProgress>,
    batch_lock: Arc<Mutex<()>>,
}

impl Coordinator {
    pub fn new() -> Self {
        let (progress_tx, progress_rx) = watch::channel(BatchProgress::default());
        Self {
            progress_tx: Arc::new(progress_tx),
            progress_rx,
            batch_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 当前进度快照
    pub fn progress(&self) -> BatchProgress {
        *self.progress_rx.borrow()
    }

    /// 订阅进度流
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress_rx.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.batch_lock.try_lock().is_ok()
    }

    /// 尝试占用批次执行权
    ///
    /// 这是一个非阻塞"抢锁"操作：已有批次在执行时直接返回 `BatchInFlight`。
    pub fn try_begin(&self, total: usize) -> Result<BatchGuard> {
        let guard = self
            .batch_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| ReaperError::BatchInFlight)?;

        self.publish(BatchProgress {
            total,
            ..Default::default()
        });
        debug!("Coordinator: batch of {} acquired", total);

        Ok(BatchGuard {
            coordinator: self.clone(),
            _guard: guard,
        })
    }

    /// 广播进度
    pub fn publish(&self, progress: BatchProgress) {
        self.progress_tx.send_replace(progress);
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// 批次守卫，在 drop 时释放执行权
pub struct BatchGuard {
    coordinator: Coordinator,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        info!("Coordinator: batch settled -> {}", self.coordinator.progress());
    }
}
