pub mod cookie;
pub mod fetcher;
pub mod sink;

#[cfg(test)]
pub mod mock;

pub use cookie::{CookieChannel, CookieRequest};
pub use fetcher::{Page, PageFetcher};
pub use sink::{DownloadId, DownloadRequest, DownloadSink};
