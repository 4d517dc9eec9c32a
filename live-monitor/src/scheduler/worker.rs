//! Monitor worker.
//!
//! One worker drives one source through the lifecycle state machine:
//!
//! ```text
//! Initializing ──ok──▶ Watching ──novel candidate──▶ Recording
//!      │                 ▲  │                           │
//!    fail                │  fail                  done / failed
//!      ▼                 │  ▼                           │
//!    Error ──backoff─────┘ Error ◀──────────────────────┘ (to Watching)
//! ```
//!
//! Nothing is fatal: session failures back off and retry, cycle failures wait
//! one polling interval, and failed recordings simply resume watching. The
//! only way out of the loop is cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{MonitorState, Source};
use crate::downloader::{DedupRegistry, DownloadCoordinator};
use crate::inspector::{InspectorSession, PageInspector};
use crate::monitor::StatusTable;
use crate::{Error, Result};

/// Default polling interval between inspection cycles.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Default delay before reopening a failed inspector session.
pub const DEFAULT_SESSION_BACKOFF: Duration = Duration::from_secs(5);

/// Timing knobs of a worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub check_interval: Duration,
    pub session_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            session_backoff: DEFAULT_SESSION_BACKOFF,
        }
    }
}

/// Shared collaborators handed to every worker.
#[derive(Clone)]
pub struct WorkerDeps {
    pub inspector: Arc<dyn PageInspector>,
    pub coordinator: Arc<DownloadCoordinator>,
    pub dedup: Arc<DedupRegistry>,
    pub status: Arc<StatusTable>,
    pub config: WorkerConfig,
}

/// Why a worker's run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Cancelled,
}

/// What a single Watching cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The page exposed no stream.
    Idle,
    /// The candidate was already claimed earlier.
    Duplicate,
    /// A new candidate was recorded to completion.
    Recorded,
    /// A new candidate was claimed but its recording failed.
    RecordFailed,
    /// Cancellation arrived mid-cycle.
    Cancelled,
}

pub struct MonitorWorker {
    source: Source,
    deps: WorkerDeps,
    token: CancellationToken,
    state: MonitorState,
}

impl MonitorWorker {
    pub fn new(source: Source, deps: WorkerDeps, token: CancellationToken) -> Self {
        Self {
            source,
            deps,
            token,
            state: MonitorState::Initializing,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Run until the cancellation token fires.
    pub async fn run(mut self) -> WorkerOutcome {
        info!(source = %self.source, "Monitor worker starting");

        'session: loop {
            self.transition(MonitorState::Initializing);

            let opened = tokio::select! {
                biased;
                _ = self.token.cancelled() => break 'session,
                opened = self.deps.inspector.open_session(&self.source) => opened,
            };

            let mut session = match opened {
                Ok(session) => session,
                Err(e) => {
                    self.fail(&e);
                    if !self.pause(self.deps.config.session_backoff).await {
                        break 'session;
                    }
                    continue 'session;
                }
            };

            debug!(source = %self.source, "Inspector session ready");
            self.transition(MonitorState::Watching);

            loop {
                match self.cycle(session.as_mut()).await {
                    Ok(CycleOutcome::Cancelled) => break 'session,
                    Ok(_) => {}
                    Err(e) => {
                        self.fail(&e);
                        if !self.pause(self.deps.config.check_interval).await {
                            break 'session;
                        }
                        if e.is_session_lost() {
                            continue 'session;
                        }
                        self.transition(MonitorState::Watching);
                        continue;
                    }
                }

                if !self.pause(self.deps.config.check_interval).await {
                    break 'session;
                }
            }
        }

        self.transition(MonitorState::Terminated);
        info!(source = %self.source, "Monitor worker stopped");
        WorkerOutcome::Cancelled
    }

    /// One Watching cycle: refresh, sample, and record a novel candidate.
    pub async fn cycle(&mut self, session: &mut dyn InspectorSession) -> Result<CycleOutcome> {
        let candidate = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Ok(CycleOutcome::Cancelled),
            candidate = inspect(session) => candidate?,
        };
        self.deps.status.record_check(self.source.id());

        let Some(stream_url) = candidate else {
            debug!(source = %self.source, "No stream candidate, waiting");
            return Ok(CycleOutcome::Idle);
        };

        if self.deps.dedup.has(&stream_url) {
            debug!(source = %self.source, url = %stream_url, "Stream already handled, waiting");
            return Ok(CycleOutcome::Duplicate);
        }

        // Unclaimed on failure, so the stream is tried again next cycle.
        self.deps.coordinator.prepare(&self.source).await?;

        if !self.deps.dedup.try_claim(&stream_url) {
            debug!(source = %self.source, url = %stream_url, "Stream claimed concurrently, waiting");
            return Ok(CycleOutcome::Duplicate);
        }

        info!(source = %self.source, url = %stream_url, "New stream detected");
        self.transition(MonitorState::Recording);

        let outcome = match self
            .deps
            .coordinator
            .record(&self.source, &stream_url, &self.token)
            .await
        {
            Ok(_) => CycleOutcome::Recorded,
            Err(e) => {
                // The URL stays claimed; the next distinct candidate gets a new try.
                self.deps.status.record_error(self.source.id(), e.to_string());
                CycleOutcome::RecordFailed
            }
        };

        if self.token.is_cancelled() {
            return Ok(CycleOutcome::Cancelled);
        }

        self.transition(MonitorState::Watching);
        Ok(outcome)
    }

    fn fail(&mut self, error: &Error) {
        warn!(source = %self.source, state = %self.state, error = %error, "Monitor cycle failed");
        self.deps.status.record_error(self.source.id(), error.to_string());
        self.transition(MonitorState::Error);
    }

    fn transition(&mut self, to: MonitorState) {
        match self.deps.status.transition(self.source.id(), to) {
            Ok(_) => self.state = to,
            Err(e) => warn!(source = %self.source, error = %e, "Rejected state change"),
        }
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

async fn inspect(session: &mut dyn InspectorSession) -> Result<Option<String>> {
    session.refresh().await?;
    session.sample_stream_candidate().await
}
