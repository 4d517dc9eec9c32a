//! Source status table.
//!
//! Every source with a running worker has exactly one entry. Workers and the
//! download coordinator write to their own entry; the reporter and the
//! manager read snapshots.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::debug;

use crate::domain::{MonitorState, Source};
use crate::{Error, Result};

/// Active recording of a source. Present only while the source is recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingRecord {
    pub stream_url: String,
    pub started_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// How a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingEnd {
    Completed,
    Failed,
    /// Stopped by shutdown. Not counted either way.
    Cancelled,
}

/// Most recent failure seen for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Status entry of one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub short_id: String,
    pub state: MonitorState,
    /// When the current state was entered.
    pub since: DateTime<Utc>,
    pub recording: Option<RecordingRecord>,
    pub last_error: Option<ErrorRecord>,
    pub last_check: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub recordings_completed: u64,
    pub recordings_failed: u64,
}

impl SourceStatus {
    fn new(source: &Source) -> Self {
        Self {
            source_id: source.id().to_string(),
            short_id: source.short_id().to_string(),
            state: MonitorState::Initializing,
            since: Utc::now(),
            recording: None,
            last_error: None,
            last_check: None,
            cycles: 0,
            recordings_completed: 0,
            recordings_failed: 0,
        }
    }
}

/// Concurrent map from source identity to [`SourceStatus`].
#[derive(Debug, Default)]
pub struct StatusTable {
    entries: DashMap<String, SourceStatus>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry for a source in `Initializing` state.
    ///
    /// Returns `false` (and leaves the entry untouched) if the source is
    /// already registered.
    pub fn register(&self, source: &Source) -> bool {
        match self.entries.entry(source.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(SourceStatus::new(source));
                true
            }
        }
    }

    /// Move a source to a new lifecycle state.
    ///
    /// Returns the previous state. Same-state transitions keep the original
    /// `since` timestamp.
    pub fn transition(&self, id: &str, to: MonitorState) -> Result<MonitorState> {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::Other(format!("unknown source {id}")))?;

        let from = entry.state;
        entry.state = from.transition_to(to)?;
        if from != to {
            entry.since = Utc::now();
            debug!(source = %id, %from, %to, "State transition");
        }
        Ok(from)
    }

    /// Enter `Recording` and attach the recording record.
    pub fn begin_recording(&self, id: &str, record: RecordingRecord) -> Result<()> {
        self.transition(id, MonitorState::Recording)?;
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.recording = Some(record);
        }
        Ok(())
    }

    /// Clear the recording record and count the outcome.
    ///
    /// The state is left as is; the worker decides where to go next.
    pub fn end_recording(&self, id: &str, end: RecordingEnd) -> Option<RecordingRecord> {
        let mut entry = self.entries.get_mut(id)?;
        match end {
            RecordingEnd::Completed => entry.recordings_completed += 1,
            RecordingEnd::Failed => entry.recordings_failed += 1,
            RecordingEnd::Cancelled => {}
        }
        entry.recording.take()
    }

    /// Remember the latest failure without changing the state.
    pub fn record_error(&self, id: &str, message: impl Into<String>) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.last_error = Some(ErrorRecord {
                message: message.into(),
                at: Utc::now(),
            });
        }
    }

    /// Count a completed inspection cycle.
    pub fn record_check(&self, id: &str) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.cycles += 1;
            entry.last_check = Some(Utc::now());
        }
    }

    pub fn get(&self, id: &str) -> Option<SourceStatus> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn state_of(&self, id: &str) -> Option<MonitorState> {
        self.entries.get(id).map(|entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every entry, sorted by source identity.
    pub fn snapshot(&self) -> Vec<SourceStatus> {
        let mut entries: Vec<SourceStatus> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        entries
    }
}
