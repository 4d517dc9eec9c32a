//! Streaming HTTP transport.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::ByteTransport;
use crate::utils::fs::io_error;
use crate::utils::http_client::{ClientOptions, build_client};
use crate::{Error, Result};

/// Write buffer size for recording files.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// [`ByteTransport`] over HTTP(S) using `reqwest`'s body stream.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport. The request timeout is ignored so that long
    /// recordings are not cut off; only the connect phase is bounded.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let options = ClientOptions {
            request_timeout: Duration::ZERO,
            connect_timeout: Some(options.connect_timeout.unwrap_or(Duration::from_secs(10))),
            ..options.clone()
        };
        Ok(Self {
            client: build_client(&options)?,
        })
    }
}

fn header_map(url: &str, headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::transport(url, format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::transport(url, format!("invalid header value for {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl ByteTransport for HttpTransport {
    #[instrument(skip(self, headers, token), fields(destination = %destination.display()))]
    async fn fetch_to_file(
        &self,
        url: &str,
        headers: &[(String, String)],
        destination: &Path,
        token: &CancellationToken,
    ) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .headers(header_map(url, headers)?)
            .send()
            .await
            .map_err(|e| Error::transport(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| io_error("creating", destination, e))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut byte_stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!(bytes = written, "Transfer cancelled");
                    writer.flush().await.map_err(|e| io_error("flushing", destination, e))?;
                    return Err(Error::transport(url, "transfer cancelled"));
                }
                chunk = byte_stream.next() => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            writer
                                .write_all(&bytes)
                                .await
                                .map_err(|e| io_error("writing", destination, e))?;
                            written += bytes.len() as u64;
                        }
                        Some(Err(e)) => {
                            // Keep what we already have on disk.
                            let _ = writer.flush().await;
                            return Err(Error::transport(url, e.to_string()));
                        }
                        None => break,
                    }
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| io_error("flushing", destination, e))?;

        debug!(bytes = written, "Stream ended");
        Ok(written)
    }
}
