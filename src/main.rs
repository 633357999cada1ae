#![allow(dead_code)]

//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖注入及批次生命周期管理。

mod core;
mod engine;
mod interfaces;
mod network;
mod sites;
mod ui;
mod utils;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::core::config::AppConfig;
use crate::core::event::create_event_channel;
use crate::core::model::ViewerLink;
use crate::engine::DownloadScheduler;
use crate::network::{FsSink, HttpService, Session};
use crate::sites::{LinkResolver, SiteRegistry};
use crate::ui::{Ui, get_multi};

/// 进度条感知的日志写入器 (TUI-aware Log Writer)
///
/// 确保非同步日志输出不会破坏终端进度条的渲染布局。
struct IndicatifWriter;

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let _ = get_multi().println(s.trim_end());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&self) -> Self::Writer {
        IndicatifWriter
    }
}

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 解析并批量下载查看页链接
    Download {
        /// 查看页链接，按给定顺序编号
        urls: Vec<String>,
        /// 从文件读取批次 (ScanItem JSON 数组或每行一个链接)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// 相对保存目录
        #[arg(short, long)]
        folder: Option<String>,
        /// 文件名前缀
        #[arg(short, long)]
        prefix: Option<String>,
        /// 并发上限
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// 下载落盘根目录
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// 仅解析链接并打印结果
    Resolve {
        urls: Vec<String>,
    },
    /// 列出已注册的图床
    Hosts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(ref path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // 遥测层初始化 (Telemetry Layer Initialization)，RUST_LOG 优先于配置
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(IndicatifWriter)
        .with_target(false)
        .with_ansi(true)
        .init();

    // 依赖项初始化与注入 (Dependency Injection)
    let session = Arc::new(Session::with_ua(config.http.user_agent.clone()));
    let http = HttpService::new(&config.http, session.clone())?;
    let registry = SiteRegistry::new();

    match cli.command {
        Commands::Hosts => {
            for (suffix, strategy) in registry.list() {
                println!("{:<20} {}", suffix, strategy);
            }
        }

        Commands::Resolve { urls } => {
            let resolver = LinkResolver::new(registry, Arc::new(http), session, config.resolver.clone());
            for url in urls {
                let outcome = resolver.resolve(&url).await;
                println!("{}\t{}", url, outcome);
            }
        }

        Commands::Download {
            urls,
            input,
            folder,
            prefix,
            concurrency,
            output_dir,
        } => {
            let links = match input {
                Some(path) => utils::load_batch(&path).await?,
                None => ViewerLink::batch(urls),
            };
            if links.is_empty() {
                tracing::warn!("没有需要下载的链接");
                return Ok(());
            }

            let folder = folder.unwrap_or(config.download.folder.clone());
            let prefix = prefix.unwrap_or(config.download.prefix.clone());
            let concurrency = concurrency.unwrap_or(config.download.concurrency);
            let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(&config.download.output_dir));

            // 建立 UI 事件反馈链路 (Event feedback loop)
            let (event_sender, event_receiver) = create_event_channel();
            let ui_handle = Ui::run(event_receiver);

            // 任务域限制 (Scope isolation so the sender drops before awaiting the UI)
            let report = {
                let resolver = LinkResolver::new(
                    registry,
                    Arc::new(http.clone()),
                    session,
                    config.resolver.clone(),
                );
                let sink = FsSink::new(http, output_dir);
                let scheduler = DownloadScheduler::new(Arc::new(resolver), Arc::new(sink))
                    .with_events(event_sender);

                tokio::select! {
                    report = scheduler.run(links, &folder, &prefix, concurrency) => report?,
                    _ = tokio::signal::ctrl_c() => {
                        tracing::warn!("收到中断信号，进度: {}", scheduler.progress());
                        return Ok(());
                    }
                }
            };

            let _ = ui_handle.await;

            for task in report.failures() {
                eprintln!(
                    "#{} {}: {}",
                    task.link.ordinal_index,
                    task.link.url,
                    task.error.as_deref().unwrap_or_default()
                );
            }
            println!("{}", report.progress);
        }
    }

    Ok(())
}
