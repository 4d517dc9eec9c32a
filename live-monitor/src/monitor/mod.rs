//! Per-source status tracking and periodic reporting.

mod reporter;
mod status;

pub use reporter::{StatusReporter, format_elapsed, render_report};
pub use status::{ErrorRecord, RecordingEnd, RecordingRecord, SourceStatus, StatusTable};
