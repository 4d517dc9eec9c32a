//! Monitor manager: wires the shared registries, the worker supervisor and
//! the background tasks together.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::MonitorSettings;
use crate::downloader::{DedupRegistry, DownloadCoordinator};
use crate::inspector::PageInspector;
use crate::monitor::{SourceStatus, StatusReporter, StatusTable};
use crate::scheduler::{ShutdownReport, SourceListReconciler, Supervisor, WorkerConfig, WorkerDeps};
use crate::transport::ByteTransport;
use crate::utils::fs;
use crate::{Error, Result};

/// Default time [`MonitorManager::stop`] waits for workers to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MonitorManager {
    settings: MonitorSettings,
    status: Arc<StatusTable>,
    dedup: Arc<DedupRegistry>,
    supervisor: Arc<Supervisor>,
    cancellation_token: CancellationToken,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MonitorManager {
    pub fn new(
        settings: MonitorSettings,
        inspector: Arc<dyn PageInspector>,
        transport: Arc<dyn ByteTransport>,
    ) -> Self {
        let status = Arc::new(StatusTable::new());
        let dedup = Arc::new(DedupRegistry::new());
        let coordinator = Arc::new(
            DownloadCoordinator::new(&settings.download_dir, transport, status.clone())
                .with_user_agent(settings.user_agent.clone()),
        );

        let deps = WorkerDeps {
            inspector,
            coordinator,
            dedup: dedup.clone(),
            status: status.clone(),
            config: WorkerConfig {
                check_interval: settings.check_interval,
                session_backoff: settings.session_backoff,
            },
        };

        let cancellation_token = CancellationToken::new();
        let supervisor = Arc::new(Supervisor::new(deps, cancellation_token.child_token()));

        Self {
            settings,
            status,
            dedup,
            supervisor,
            cancellation_token,
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Populate the initial sources and start the reconciler and the reporter.
    ///
    /// Fails if the download directory cannot be created or the source list
    /// cannot be read. Later read failures are only logged.
    pub async fn start(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(Error::Other("monitor manager already stopped".to_string()));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Other("monitor manager already started".to_string()));
        }

        let result = self.start_tasks().await;
        if result.is_err() {
            self.started.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn start_tasks(&self) -> Result<()> {
        fs::ensure_dir_all_with_op("creating download directory", &self.settings.download_dir)
            .await?;

        let mut reconciler = SourceListReconciler::new(
            &self.settings.sources_file,
            self.settings.reconcile_interval,
            self.supervisor.clone(),
        );
        let initial = reconciler.reconcile_now().await?;
        info!(
            sources = initial.listed,
            download_dir = %self.settings.download_dir.display(),
            "Monitoring started"
        );

        let reporter = StatusReporter::new(
            self.status.clone(),
            self.settings.status_interval,
            self.settings.status_grace_period,
        );

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(
            reconciler.run(self.cancellation_token.child_token()),
        ));
        tasks.push(tokio::spawn(
            reporter.run(self.cancellation_token.child_token()),
        ));
        Ok(())
    }

    /// Cancel every task and wait for the workers to exit.
    pub async fn stop(&self) -> ShutdownReport {
        self.stop_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    pub async fn stop_with_timeout(&self, timeout: Duration) -> ShutdownReport {
        info!("Stopping monitor manager");
        self.cancellation_token.cancel();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            // Both loops return promptly on cancellation.
            let _ = task.await;
        }

        self.supervisor.shutdown(timeout).await
    }

    /// Snapshot of every source's status, sorted by identity.
    pub fn status_snapshot(&self) -> Vec<SourceStatus> {
        self.status.snapshot()
    }

    pub fn dedup(&self) -> &Arc<DedupRegistry> {
        &self.dedup
    }

    pub fn running_sources(&self) -> HashSet<String> {
        self.supervisor.running_ids()
    }
}
