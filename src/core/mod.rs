pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod model;
