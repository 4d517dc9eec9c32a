//! Shared helpers.

pub mod filename;
pub mod fs;
pub mod http_client;
pub mod url;
