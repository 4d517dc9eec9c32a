//! Monitor worker lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Lifecycle states of a monitor worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorState {
    /// Opening a page inspector session.
    #[default]
    Initializing,
    /// Polling the page for a stream candidate ("waiting").
    Watching,
    /// A download is in progress.
    Recording,
    /// The last cycle failed; the worker will retry.
    Error,
    /// The worker was cancelled. Only happens on shutdown.
    Terminated,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Watching => "WATCHING",
            Self::Recording => "RECORDING",
            Self::Error => "ERROR",
            Self::Terminated => "TERMINATED",
        }
    }

    /// Human-facing label used in status reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Watching => "waiting",
            Self::Recording => "recording",
            Self::Error => "error",
            Self::Terminated => "terminated",
        }
    }

    /// Validate a state transition.
    pub fn can_transition_to(&self, target: MonitorState) -> bool {
        use MonitorState::*;

        match (self, target) {
            (from, to) if *from == to => true,

            (Terminated, _) => false,
            (_, Terminated) => true,

            (Initializing, Watching | Error) => true,
            (Watching, Recording | Error) => true,
            (Recording, Watching | Error) => true,
            (Error, Watching | Initializing) => true,

            _ => false,
        }
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&self, target: MonitorState) -> Result<MonitorState, Error> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
