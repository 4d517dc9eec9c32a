//! Page inspection: turning a monitored page into at most one stream candidate.
//!
//! The worker only talks to the [`PageInspector`] and [`InspectorSession`]
//! traits. How a page is loaded and which of its requests count as a media
//! stream is entirely up to the implementation.

mod extract;
mod http;

use async_trait::async_trait;

use crate::Result;
use crate::domain::Source;

pub use extract::{find_stream_candidates, is_stream_candidate};
pub use http::{HttpInspectorSession, HttpPageInspector};

/// Factory for per-source inspection sessions.
#[async_trait]
pub trait PageInspector: Send + Sync + 'static {
    /// Open a session bound to the source's page.
    ///
    /// Failures here are `Error::Session` and make the worker back off
    /// before trying again.
    async fn open_session(&self, source: &Source) -> Result<Box<dyn InspectorSession>>;
}

/// A live view onto one page.
#[async_trait]
pub trait InspectorSession: Send {
    /// Reload the page so new network activity can be sampled.
    async fn refresh(&mut self) -> Result<()>;

    /// Return at most one URL that plausibly points at the page's media stream.
    async fn sample_stream_candidate(&mut self) -> Result<Option<String>>;
}
