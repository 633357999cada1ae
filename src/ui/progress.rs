//! 终端进度渲染引擎 (Terminal UI Progress Engine)
//!
//! 基于 `indicatif` 实现非阻塞式进度条编排，消费调度器事件实时刷新批次状态。

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::event::{EventReceiver, ReaperEvent};
use crate::core::model::{BatchProgress, TaskState};

/// 全局 TUI 容器 (Singleton)
static MULTI: OnceLock<MultiProgress> = OnceLock::new();

/// 获取全局进度容器实例
pub fn get_multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

/// TUI 状态容器
#[derive(Default)]
pub struct UiState {
    /// 批次进度条
    batch_bar: Option<ProgressBar>,
    /// 当前活动条目
    activity_bar: Option<ProgressBar>,
}

static STATE: OnceLock<Arc<RwLock<UiState>>> = OnceLock::new();

fn get_state() -> &'static Arc<RwLock<UiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(UiState::default())))
}

/// 进度协调器 (Progress Orchestrator)
pub struct Ui;

impl Ui {
    /// 激活事件监听循环，所有发送端关闭后退出
    pub fn run(receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv_async().await {
                Self::handle_event(event);
            }
        })
    }

    /// 执行 UI 状态转换与渲染更新
    fn handle_event(event: ReaperEvent) {
        let multi = get_multi();
        let state = get_state();
        let mut ui = state.write();

        match event {
            ReaperEvent::BatchStarted { total, concurrency } => {
                let bar = multi.add(ProgressBar::new(total as u64));
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                {
                    bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
                }
                bar.set_message(format!("x{} workers", concurrency));
                bar.enable_steady_tick(Duration::from_millis(100));

                let activity = multi.add(ProgressBar::new_spinner());
                if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
                    activity.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
                }
                activity.enable_steady_tick(Duration::from_millis(100));

                ui.batch_bar = Some(bar);
                ui.activity_bar = Some(activity);
            }
            ReaperEvent::TaskState { index, url, state } => {
                if state.is_active()
                    && let Some(ref bar) = ui.activity_bar
                {
                    bar.set_message(format!("#{} {} {}", index, state_label(state), truncate_string(&url, 60)));
                }
            }
            ReaperEvent::TaskSucceeded { .. } => {}
            ReaperEvent::TaskFailed { index, error, .. } => {
                if let Some(ref bar) = ui.batch_bar {
                    bar.println(format!("❌ #{}: {}", index, truncate_string(&error, 100)));
                }
            }
            ReaperEvent::Progress(progress) => {
                if let Some(ref bar) = ui.batch_bar {
                    bar.set_position(progress.completed as u64);
                    bar.set_message(summary(&progress));
                }
            }
            ReaperEvent::BatchCompleted(progress) => {
                if let Some(bar) = ui.activity_bar.take() {
                    bar.finish_and_clear();
                }
                if let Some(bar) = ui.batch_bar.take() {
                    bar.set_position(progress.completed as u64);
                    if progress.failed == 0 {
                        bar.finish_with_message(format!("✅ DONE {}", summary(&progress)));
                    } else {
                        bar.abandon_with_message(format!("⚠️ DONE {}", summary(&progress)));
                    }
                }
            }
        }
    }
}

fn state_label(state: TaskState) -> &'static str {
    match state {
        TaskState::Resolving => "🔎",
        TaskState::Resolved => "🔗",
        TaskState::Downloading => "⬇️",
        _ => "",
    }
}

fn summary(progress: &BatchProgress) -> String {
    format!("ok {} / failed {}", progress.succeeded, progress.failed)
}

/// 执行语义化字符串截断
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
