//! Byte transport: streaming a stream URL into a file.

mod http;

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;

pub use http::HttpTransport;

/// Streams the bytes behind a URL into a file.
///
/// Implementations must write incrementally: live recordings have no upper
/// bound on their length.
#[async_trait]
pub trait ByteTransport: Send + Sync + 'static {
    /// Download `url` into `destination`, returning the number of bytes written.
    ///
    /// Returns when the remote side ends the stream. Cancelling `token` stops
    /// the transfer and leaves whatever was written so far on disk.
    async fn fetch_to_file(
        &self,
        url: &str,
        headers: &[(String, String)],
        destination: &Path,
        token: &CancellationToken,
    ) -> Result<u64>;
}
