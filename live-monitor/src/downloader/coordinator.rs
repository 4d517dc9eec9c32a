//! Download coordinator.
//!
//! Wraps the byte transport with output naming, directory creation, request
//! headers and status table bookkeeping. Failures are returned to the caller
//! and never retried here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::domain::Source;
use crate::monitor::{RecordingEnd, RecordingRecord, StatusTable};
use crate::transport::ByteTransport;
use crate::utils::fs;
use crate::utils::http_client::DEFAULT_USER_AGENT;

/// Timestamp format used in recording filenames.
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Result of a finished recording.
#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub elapsed: Duration,
}

pub struct DownloadCoordinator {
    download_dir: PathBuf,
    user_agent: String,
    transport: Arc<dyn ByteTransport>,
    status: Arc<StatusTable>,
}

impl DownloadCoordinator {
    pub fn new(
        download_dir: impl Into<PathBuf>,
        transport: Arc<dyn ByteTransport>,
        status: Arc<StatusTable>,
    ) -> Self {
        Self {
            download_dir: download_dir.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            transport,
            status,
        }
    }

    /// Override the `User-Agent` sent with stream requests.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// `{download_dir}/stream_{short_id}_{YYYYMMDD_HHMMSS}.flv`
    pub fn destination_path(&self, source: &Source, at: DateTime<Local>) -> PathBuf {
        self.download_dir.join(format!(
            "stream_{}_{}.flv",
            source.short_id(),
            at.format(FILENAME_TIMESTAMP_FORMAT)
        ))
    }

    /// Headers the stream origin expects. The CDN rejects requests whose
    /// `Referer` is not the room page.
    pub fn request_headers(&self, source: &Source) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Referer".to_string(), source.url().to_string()),
            ("Accept".to_string(), "*/*".to_string()),
            ("Connection".to_string(), "keep-alive".to_string()),
        ]
    }

    /// Make sure the download directory exists.
    ///
    /// Workers call this before claiming a candidate so that a directory
    /// problem leaves the stream URL unclaimed for the next cycle. A failure
    /// counts as a failed recording of `source`.
    pub async fn prepare(&self, source: &Source) -> Result<()> {
        let result =
            fs::ensure_dir_all_with_op("creating download directory", &self.download_dir).await;
        if let Err(e) = &result {
            warn!(
                source = %source,
                dir = %self.download_dir.display(),
                error = %e,
                "Download directory unavailable"
            );
            self.status.end_recording(source.id(), RecordingEnd::Failed);
        }
        result
    }

    /// Record `stream_url` for `source` until the stream ends.
    ///
    /// The source's status entry carries the recording record for the
    /// duration of the call and is cleared afterwards, whatever the outcome.
    pub async fn record(
        &self,
        source: &Source,
        stream_url: &str,
        token: &CancellationToken,
    ) -> Result<RecordingOutcome> {
        self.prepare(source).await?;

        let now = Local::now();
        let path = self.destination_path(source, now);

        self.status.begin_recording(
            source.id(),
            RecordingRecord {
                stream_url: stream_url.to_string(),
                started_at: now.with_timezone(&Utc),
                path: path.clone(),
            },
        )?;

        info!(source = %source, path = %path.display(), "Recording started");

        let started = Instant::now();
        let headers = self.request_headers(source);
        let result = self
            .transport
            .fetch_to_file(stream_url, &headers, &path, token)
            .await;

        let end = match &result {
            Ok(_) => RecordingEnd::Completed,
            Err(_) if token.is_cancelled() => RecordingEnd::Cancelled,
            Err(_) => RecordingEnd::Failed,
        };
        self.status.end_recording(source.id(), end);

        match result {
            Ok(bytes) => {
                let elapsed = started.elapsed();
                info!(
                    source = %source,
                    path = %path.display(),
                    bytes,
                    elapsed_secs = elapsed.as_secs(),
                    "Recording finished"
                );
                Ok(RecordingOutcome {
                    path,
                    bytes,
                    elapsed,
                })
            }
            Err(e) if end == RecordingEnd::Cancelled => {
                info!(source = %source, path = %path.display(), "Recording stopped by shutdown");
                Err(e)
            }
            Err(e) => {
                warn!(source = %source, path = %path.display(), error = %e, "Recording failed");
                Err(e)
            }
        }
    }
}
