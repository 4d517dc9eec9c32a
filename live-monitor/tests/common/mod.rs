//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use live_monitor::domain::Source;
use live_monitor::downloader::{DedupRegistry, DownloadCoordinator};
use live_monitor::inspector::{InspectorSession, PageInspector};
use live_monitor::monitor::StatusTable;
use live_monitor::scheduler::{WorkerConfig, WorkerDeps};
use live_monitor::transport::ByteTransport;
use live_monitor::{Error, Result};

/// What a fake page returns when sampled.
#[derive(Debug, Clone)]
pub enum PageScript {
    Empty,
    Stream(String),
    SampleError,
    SessionLost,
    Panic,
}

#[derive(Default)]
struct PageState {
    scripts: HashMap<String, PageScript>,
    open_failures: HashMap<String, usize>,
    opened: HashMap<String, usize>,
    samples: HashMap<String, usize>,
}

/// Inspector whose pages are scripted per source identity. Unscripted pages
/// never expose a stream.
#[derive(Clone, Default)]
pub struct FakeInspector {
    state: Arc<Mutex<PageState>>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, id: &str, script: PageScript) {
        self.state.lock().scripts.insert(id.to_string(), script);
    }

    /// Make the next `count` session opens for `id` fail.
    pub fn fail_opens(&self, id: &str, count: usize) {
        self.state.lock().open_failures.insert(id.to_string(), count);
    }

    pub fn opened(&self, id: &str) -> usize {
        self.state.lock().opened.get(id).copied().unwrap_or(0)
    }

    pub fn samples(&self, id: &str) -> usize {
        self.state.lock().samples.get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PageInspector for FakeInspector {
    async fn open_session(&self, source: &Source) -> Result<Box<dyn InspectorSession>> {
        let mut state = self.state.lock();
        *state.opened.entry(source.id().to_string()).or_default() += 1;

        let remaining = state.open_failures.entry(source.id().to_string()).or_default();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(Error::session("page did not load"));
        }

        Ok(Box::new(FakeSession {
            id: source.id().to_string(),
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    id: String,
    state: Arc<Mutex<PageState>>,
}

#[async_trait]
impl InspectorSession for FakeSession {
    async fn refresh(&mut self) -> Result<()> {
        Ok(())
    }

    async fn sample_stream_candidate(&mut self) -> Result<Option<String>> {
        let script = {
            let mut state = self.state.lock();
            *state.samples.entry(self.id.clone()).or_default() += 1;
            state.scripts.get(&self.id).cloned().unwrap_or(PageScript::Empty)
        };

        match script {
            PageScript::Empty => Ok(None),
            PageScript::Stream(url) => Ok(Some(url)),
            PageScript::SampleError => Err(Error::sample("page script timed out")),
            PageScript::SessionLost => {
                // Lose the session once, then behave like an empty page.
                self.state
                    .lock()
                    .scripts
                    .insert(self.id.clone(), PageScript::Empty);
                Err(Error::session("browser went away"))
            }
            PageScript::Panic => {
                self.state
                    .lock()
                    .scripts
                    .insert(self.id.clone(), PageScript::Empty);
                panic!("inspector blew up");
            }
        }
    }
}

/// A transport call as observed by [`FakeTransport`].
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub destination: PathBuf,
}

/// Transport that writes a fixed payload, optionally failing some URLs or
/// holding the transfer open until cancelled.
#[derive(Clone, Default)]
pub struct FakeTransport {
    calls: Arc<Mutex<Vec<FetchCall>>>,
    failing: Arc<Mutex<Vec<String>>>,
    hold: Arc<Mutex<bool>>,
}

impl FakeTransport {
    pub const PAYLOAD: &'static [u8] = b"FLV\x01\x05\x00\x00\x00\x09";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_url(&self, url: &str) {
        self.failing.lock().push(url.to_string());
    }

    /// Keep transfers open until their token is cancelled.
    pub fn hold_transfers(&self) {
        *self.hold.lock() = true;
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.url == url).count()
    }
}

#[async_trait]
impl ByteTransport for FakeTransport {
    async fn fetch_to_file(
        &self,
        url: &str,
        headers: &[(String, String)],
        destination: &Path,
        token: &CancellationToken,
    ) -> Result<u64> {
        self.calls.lock().push(FetchCall {
            url: url.to_string(),
            headers: headers.to_vec(),
            destination: destination.to_path_buf(),
        });

        if self.failing.lock().iter().any(|u| u == url) {
            return Err(Error::transport(url, "connection reset"));
        }

        tokio::fs::write(destination, Self::PAYLOAD).await?;

        if *self.hold.lock() {
            token.cancelled().await;
            return Err(Error::transport(url, "transfer cancelled"));
        }

        Ok(Self::PAYLOAD.len() as u64)
    }
}

pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        check_interval: Duration::from_millis(10),
        session_backoff: Duration::from_millis(10),
    }
}

pub fn source(url: &str) -> Source {
    Source::parse(url).unwrap()
}

/// Worker dependencies wired to the given fakes.
pub fn deps(download_dir: &Path, inspector: &FakeInspector, transport: &FakeTransport) -> WorkerDeps {
    let status = Arc::new(StatusTable::new());
    let coordinator = Arc::new(DownloadCoordinator::new(
        download_dir,
        Arc::new(transport.clone()),
        status.clone(),
    ));
    WorkerDeps {
        inspector: Arc::new(inspector.clone()),
        coordinator,
        dedup: Arc::new(DedupRegistry::new()),
        status,
        config: fast_config(),
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    wait_until_async(|| std::future::ready(condition())).await
}

pub async fn wait_until_async<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
