//! Periodic, human-readable status report.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::status::{SourceStatus, StatusTable};

/// Format an elapsed duration as `{h}h {m}m {s}s`.
///
/// Negative durations (clock skew) render as zero.
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

fn render_entry(status: &SourceStatus, now: DateTime<Utc>) -> String {
    let mut line = format!("{} [{}]", status.source_id, status.state.label());

    if let Some(recording) = &status.recording {
        line.push_str(&format!(
            " elapsed {} -> {}",
            format_elapsed(now - recording.started_at),
            recording.path.display()
        ));
    }

    if let Some(error) = &status.last_error {
        line.push_str(&format!(
            " (last error {} ago: {})",
            format_elapsed(now - error.at),
            error.message
        ));
    }

    line
}

/// Render one line per entry.
pub fn render_report(entries: &[SourceStatus], now: DateTime<Utc>) -> Vec<String> {
    entries.iter().map(|entry| render_entry(entry, now)).collect()
}

/// Logs the status table on a fixed interval.
pub struct StatusReporter {
    table: Arc<StatusTable>,
    interval: Duration,
    grace_period: Duration,
}

impl StatusReporter {
    pub fn new(table: Arc<StatusTable>, interval: Duration, grace_period: Duration) -> Self {
        Self {
            table,
            interval,
            grace_period,
        }
    }

    /// Log the current table once.
    pub fn report(&self) -> Vec<String> {
        let snapshot = self.table.snapshot();
        let lines = render_report(&snapshot, Utc::now());

        let recording = snapshot.iter().filter(|s| s.recording.is_some()).count();
        info!(sources = snapshot.len(), recording, "Status report");
        for line in &lines {
            info!("  {}", line);
        }

        lines
    }

    /// Report until cancelled. The first report comes after the grace period
    /// so that workers have had a chance to open their sessions.
    pub async fn run(self, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(self.grace_period) => {}
        }

        loop {
            self.report();

            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Status reporter shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
