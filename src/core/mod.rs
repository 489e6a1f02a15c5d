pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod images;
pub mod jobs;
pub mod lifecycle;
pub mod solar;
pub mod store;
pub mod terminal;
