//! Worker scheduling.
//!
//! - `MonitorWorker`: per-source lifecycle state machine
//! - `WorkerRegistry`: running workers and their tasks
//! - `Supervisor`: owns the registry, spawns and restarts workers
//! - `SourceListReconciler`: spawns workers for newly listed sources

mod reconciler;
mod registry;
mod supervisor;
mod worker;

pub use reconciler::{
    DEFAULT_RECONCILE_INTERVAL, ReconcileReport, SourceListReconciler, parse_source_list,
};
pub use registry::{WorkerHandle, WorkerRegistry, WorkerTaskResult};
pub use supervisor::{ShutdownReport, Supervisor};
pub use worker::{
    CycleOutcome, DEFAULT_CHECK_INTERVAL, DEFAULT_SESSION_BACKOFF, MonitorWorker, WorkerConfig,
    WorkerDeps, WorkerOutcome,
};
