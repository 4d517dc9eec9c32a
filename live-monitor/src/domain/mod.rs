//! Domain types: monitored sources and the worker lifecycle.

mod source;
mod state;

pub use source::Source;
pub use state::MonitorState;
