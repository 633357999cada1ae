//! 文件系统下载落地 (Filesystem Download Sink)
//!
//! 以流式写入 `.part` 临时文件，完成后原子重命名为目标文件。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::error::{ReaperError, Result};
use crate::interfaces::{DownloadId, DownloadRequest, DownloadSink};
use crate::network::service::HttpService;

pub struct FsSink {
    http: HttpService,
    root: PathBuf,
    next_id: AtomicU64,
}

impl FsSink {
    pub fn new(http: HttpService, root: impl Into<PathBuf>) -> Self {
        Self {
            http,
            root: root.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_stream(&self, request: &DownloadRequest, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let resp = self
            .http
            .get(&request.url, request.referer.as_deref())
            .await?;

        let part = dest.with_extension("part");
        let mut file = fs::File::create(&part).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk: bytes::Bytes = chunk.map_err(ReaperError::Network)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        fs::rename(&part, dest).await?;
        Ok(written)
    }
}

#[async_trait]
impl DownloadSink for FsSink {
    async fn submit(&self, request: DownloadRequest) -> Result<DownloadId> {
        let dest = self.root.join(&request.filename);
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Download {} {} -> {}", id, request.url, dest.display());

        match self.write_stream(&request, &dest).await {
            Ok(bytes) => {
                info!("已保存 {} ({} bytes)", request.filename, bytes);
                Ok(id)
            }
            Err(e) => {
                let _ = fs::remove_file(dest.with_extension("part")).await;
                Err(ReaperError::Sink(format!("{}: {}", request.url, e)))
            }
        }
    }
}
