//! Application configuration.
//!
//! Loaded from a JSON file that is created with defaults when missing.
//! Missing keys fall back to their defaults, and a couple of environment
//! variables can override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::utils::fs;
use crate::utils::http_client::{ClientOptions, DEFAULT_USER_AGENT};
use crate::{Error, Result};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `download_dir`.
pub const ENV_DOWNLOAD_DIR: &str = "LIVE_MONITOR_DOWNLOAD_DIR";

/// Environment variable overriding `sources_file`.
pub const ENV_SOURCES_FILE: &str = "LIVE_MONITOR_SOURCES_FILE";

/// On-disk configuration. Intervals are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory recordings are written to.
    pub download_dir: PathBuf,
    /// Polling interval of each monitor worker.
    pub check_interval: u64,
    /// How often the source list is checked for changes.
    pub reconcile_interval: u64,
    /// How often the status report is logged.
    pub status_interval: u64,
    /// Delay before the first status report.
    pub status_grace_period: u64,
    /// Delay before reopening a failed inspector session.
    pub session_backoff: u64,
    /// Line-oriented list of page URLs to monitor.
    pub sources_file: PathBuf,
    /// User agent for page and stream requests.
    pub user_agent: String,
    /// Timeout for page requests. Stream downloads are not bounded.
    pub request_timeout: u64,
    /// Optional proxy URL for all requests.
    pub proxy: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            check_interval: 5,
            reconcile_interval: 5,
            status_interval: 30,
            status_grace_period: 10,
            session_backoff: 5,
            sources_file: PathBuf::from("url.txt"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: 15,
            proxy: None,
        }
    }
}

impl AppConfig {
    /// Load the configuration, writing a default file first if none exists.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!(path = %path.display(), "Created default configuration");
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| fs::io_error("reading", path, e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("invalid {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::ensure_dir_all_sync_with_op("creating config directory", parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| fs::io_error("writing", path, e))
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_DOWNLOAD_DIR).filter(|v| !v.trim().is_empty()) {
            self.download_dir = PathBuf::from(dir.trim());
        }
        if let Some(file) = lookup(ENV_SOURCES_FILE).filter(|v| !v.trim().is_empty()) {
            self.sources_file = PathBuf::from(file.trim());
        }
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("check_interval", self.check_interval),
            ("reconcile_interval", self.reconcile_interval),
            ("status_interval", self.status_interval),
            ("session_backoff", self.session_backoff),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::config(format!("{name} must be greater than 0")));
            }
        }
        if self.download_dir.as_os_str().is_empty() {
            return Err(Error::config("download_dir must not be empty"));
        }
        if self.sources_file.as_os_str().is_empty() {
            return Err(Error::config("sources_file must not be empty"));
        }
        Ok(())
    }

    /// Change the download directory: made absolute and created if missing.
    pub fn set_download_dir(&mut self, dir: &Path) -> Result<PathBuf> {
        let absolute = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| fs::io_error("resolving", dir, e))?
                .join(dir)
        };
        fs::ensure_dir_all_sync_with_op("creating download directory", &absolute)?;
        self.download_dir = absolute.clone();
        Ok(absolute)
    }

    /// HTTP client options shared by the page inspector and the transport.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            user_agent: Some(self.user_agent.clone()),
            request_timeout: Duration::from_secs(self.request_timeout),
            connect_timeout: None,
            proxy: self.proxy.clone().filter(|p| !p.trim().is_empty()),
        }
    }

    /// Runtime settings with intervals as `Duration`s.
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            download_dir: self.download_dir.clone(),
            sources_file: self.sources_file.clone(),
            check_interval: Duration::from_secs(self.check_interval),
            reconcile_interval: Duration::from_secs(self.reconcile_interval),
            status_interval: Duration::from_secs(self.status_interval),
            status_grace_period: Duration::from_secs(self.status_grace_period),
            session_backoff: Duration::from_secs(self.session_backoff),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Settings the manager runs with.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub download_dir: PathBuf,
    pub sources_file: PathBuf,
    pub check_interval: Duration,
    pub reconcile_interval: Duration,
    pub status_interval: Duration,
    pub status_grace_period: Duration,
    pub session_backoff: Duration,
    pub user_agent: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        AppConfig::default().settings()
    }
}
