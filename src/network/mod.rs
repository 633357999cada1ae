pub mod download;
pub mod middleware;
pub mod service;
pub mod session;

pub use download::FsSink;
pub use service::HttpService;
pub use session::Session;
