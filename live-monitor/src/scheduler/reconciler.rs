//! Source list reconciler.
//!
//! Polls the source list file for modification-time changes and spawns a
//! worker for every source that is listed but not yet running. Sources that
//! disappear from the list keep their worker: removal is not supported.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::supervisor::Supervisor;
use crate::Result;
use crate::domain::Source;
use crate::utils::fs;

/// Default interval between source list checks.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

/// Parse the source list: one URL per line, blank lines and `#` comments
/// ignored. Sources with the same identity are collapsed, first one wins.
pub fn parse_source_list(content: &str) -> Vec<Source> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(Source::parse)
        .filter(|source| seen.insert(source.id().to_string()))
        .collect()
}

/// What a reconciliation pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Distinct sources currently listed.
    pub listed: usize,
    /// Identities of sources whose worker was started in this pass.
    pub added: Vec<String>,
}

pub struct SourceListReconciler {
    path: PathBuf,
    interval: Duration,
    last_modified: Option<SystemTime>,
    supervisor: Arc<Supervisor>,
}

impl SourceListReconciler {
    pub fn new(path: impl Into<PathBuf>, interval: Duration, supervisor: Arc<Supervisor>) -> Self {
        Self {
            path: path.into(),
            interval,
            last_modified: None,
            supervisor,
        }
    }

    /// Reconcile if the file changed since the last successful pass.
    ///
    /// Returns `Ok(None)` when the modification time is unchanged.
    pub async fn reconcile(&mut self) -> Result<Option<ReconcileReport>> {
        let modified = fs::modified_time(&self.path).await?;
        if self.last_modified == Some(modified) {
            return Ok(None);
        }

        info!(path = %self.path.display(), "Source list changed, reconciling");
        let report = self.apply().await?;
        self.last_modified = Some(modified);
        Ok(Some(report))
    }

    /// Read the file and diff it against the running set, ignoring the
    /// stored modification time. Used for the initial population.
    pub async fn reconcile_now(&mut self) -> Result<ReconcileReport> {
        let modified = fs::modified_time(&self.path).await?;
        let report = self.apply().await?;
        self.last_modified = Some(modified);
        Ok(report)
    }

    async fn apply(&self) -> Result<ReconcileReport> {
        let content = fs::read_to_string(&self.path).await?;
        let sources = parse_source_list(&content);
        let running = self.supervisor.running_ids();
        let listed: HashSet<String> = sources.iter().map(|s| s.id().to_string()).collect();

        let mut report = ReconcileReport {
            listed: sources.len(),
            added: Vec::new(),
        };

        for source in sources {
            if running.contains(source.id()) {
                continue;
            }
            let id = source.id().to_string();
            if self.supervisor.spawn_source(source) {
                info!(source = %id, "New source discovered");
                report.added.push(id);
            }
        }

        let delisted = running.difference(&listed).count();
        if delisted > 0 {
            debug!(delisted, "Sources no longer listed keep running");
        }

        Ok(report)
    }

    /// Poll the source list until cancelled.
    ///
    /// Errors (missing or unreadable file) are logged and retried on the next
    /// tick; they never stop the loop.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Source list reconciler shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            let restarted = self.supervisor.restart_crashed();
            if restarted > 0 {
                info!(restarted, "Restarted crashed monitor workers");
            }

            match self.reconcile().await {
                Ok(Some(report)) if !report.added.is_empty() => {
                    info!(
                        listed = report.listed,
                        added = report.added.len(),
                        running = self.supervisor.worker_count(),
                        "Source list reconciled"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to reconcile source list");
                }
            }
        }
    }
}
