pub mod config;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod inspector;
pub mod logging;
pub mod manager;
pub mod monitor;
pub mod scheduler;
pub mod transport;
pub mod utils;

pub use error::{Error, Result};
