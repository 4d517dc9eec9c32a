//! Supervisor: the single owner of the running-worker set.
//!
//! Only the reconciler and the manager's startup path add workers. Workers
//! never touch this set themselves.

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::registry::WorkerRegistry;
use super::worker::{MonitorWorker, WorkerDeps};
use crate::domain::{MonitorState, Source};
use crate::monitor::RecordingEnd;

/// Summary returned by [`Supervisor::shutdown`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stopped: usize,
    pub crashed: usize,
    pub timed_out: bool,
}

pub struct Supervisor {
    deps: WorkerDeps,
    registry: Mutex<WorkerRegistry>,
    cancellation_token: CancellationToken,
}

impl Supervisor {
    pub fn new(deps: WorkerDeps, cancellation_token: CancellationToken) -> Self {
        Self {
            deps,
            registry: Mutex::new(WorkerRegistry::new()),
            cancellation_token,
        }
    }

    /// Start monitoring a source.
    ///
    /// Registers the source in the status table and spawns its worker.
    /// Returns `false` if the source already has a worker.
    pub fn spawn_source(&self, source: Source) -> bool {
        let mut registry = self.registry.lock();
        if registry.contains(source.id()) {
            return false;
        }

        self.deps.status.register(&source);

        let token = self.cancellation_token.child_token();
        let worker = MonitorWorker::new(source, self.deps.clone(), token.clone());
        registry.spawn(worker, token)
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.registry.lock().contains(id)
    }

    pub fn running_ids(&self) -> HashSet<String> {
        self.registry.lock().ids().cloned().collect()
    }

    pub fn worker_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Restart workers that died unexpectedly.
    ///
    /// Workers only leave their loop when cancelled, so a finished task that
    /// was not cancelled means it panicked. Its source is spawned again so one
    /// bad page cannot drop out of monitoring.
    pub fn restart_crashed(&self) -> usize {
        if self.cancellation_token.is_cancelled() {
            return 0;
        }

        let mut registry = self.registry.lock();
        let finished = registry.reap_finished();
        let mut restarted = 0;

        for (result, handle) in finished {
            let (Err(error), Some(handle)) = (result.outcome, handle) else {
                continue;
            };
            let source = handle.source;
            error!(source = %source, error = %error, "Monitor worker crashed, restarting");

            let status = &self.deps.status;
            if status.get(source.id()).is_some_and(|s| s.recording.is_some()) {
                status.end_recording(source.id(), RecordingEnd::Failed);
            }
            status.record_error(source.id(), format!("worker crashed: {error}"));
            let _ = status.transition(source.id(), MonitorState::Error);

            let token = self.cancellation_token.child_token();
            let worker = MonitorWorker::new(source, self.deps.clone(), token.clone());
            if registry.spawn(worker, token) {
                restarted += 1;
            }
        }

        restarted
    }

    /// Cancel all workers and wait up to `timeout` for them to exit.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        self.cancellation_token.cancel();
        let mut tasks = self.registry.lock().drain();
        let mut report = ShutdownReport::default();

        let wait_all = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(result) if result.is_crash() => report.crashed += 1,
                    Ok(_) => report.stopped += 1,
                    Err(e) => {
                        warn!(error = %e, "Worker task failed to join");
                        report.crashed += 1;
                    }
                }
            }
        };

        if tokio::time::timeout(timeout, wait_all).await.is_err() {
            warn!("Timed out waiting for monitor workers; aborting the rest");
            report.timed_out = true;
        }

        info!(
            stopped = report.stopped,
            crashed = report.crashed,
            "Monitor workers shut down"
        );
        report
    }
}
