//! Registry of running monitor workers.
//!
//! Tracks one handle per source identity and owns the `JoinSet` the worker
//! tasks run in.

use std::collections::HashMap;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::worker::{MonitorWorker, WorkerOutcome};
use crate::domain::Source;

/// Result of a worker task.
#[derive(Debug)]
pub struct WorkerTaskResult {
    pub source_id: String,
    /// `Err` holds the panic message if the worker panicked.
    pub outcome: Result<WorkerOutcome, String>,
}

impl WorkerTaskResult {
    pub fn is_crash(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Handle to a running worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub source: Source,
    pub token: CancellationToken,
}

/// Running workers keyed by source identity.
pub struct WorkerRegistry {
    workers: HashMap<String, WorkerHandle>,
    task_set: JoinSet<WorkerTaskResult>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
            task_set: JoinSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.workers.keys()
    }

    /// Spawn a worker task and register its handle.
    ///
    /// Returns `false` without spawning if a worker for the same source
    /// already exists. Must be called from within a Tokio runtime.
    pub fn spawn(&mut self, worker: MonitorWorker, token: CancellationToken) -> bool {
        let source = worker.source().clone();
        let id = source.id().to_string();

        if self.workers.contains_key(&id) {
            return false;
        }

        info!(source = %id, "Spawning monitor worker");

        self.workers.insert(
            id.clone(),
            WorkerHandle {
                source,
                token,
            },
        );

        // The worker runs in its own task so a panic surfaces as a `JoinError`
        // while the source identity stays with the outer task.
        self.task_set.spawn(async move {
            let outcome = tokio::spawn(worker.run())
                .await
                .map_err(join_error_message);
            WorkerTaskResult {
                source_id: id,
                outcome,
            }
        });

        true
    }

    /// Collect tasks that already finished without waiting.
    ///
    /// Finished workers are removed from the registry and returned together
    /// with their handle.
    pub fn reap_finished(&mut self) -> Vec<(WorkerTaskResult, Option<WorkerHandle>)> {
        let mut finished = Vec::new();
        while let Some(joined) = self.task_set.try_join_next() {
            if let Ok(result) = joined {
                debug!(source = %result.source_id, crashed = result.is_crash(), "Worker task finished");
                let handle = self.workers.remove(&result.source_id);
                finished.push((result, handle));
            }
        }
        finished
    }

    /// Cancel every worker and hand back the task set so the caller can
    /// await it without holding a lock.
    pub fn drain(&mut self) -> JoinSet<WorkerTaskResult> {
        for handle in self.workers.values() {
            handle.token.cancel();
        }
        self.workers.clear();
        std::mem::take(&mut self.task_set)
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn join_error_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    panic_message(error.into_panic().as_ref())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
