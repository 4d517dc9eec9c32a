//! Process-wide set of stream URLs that have already been claimed.

use dashmap::DashSet;

/// Stream URLs accepted for download.
///
/// Entries are never removed: a URL that was recorded once, or whose
/// recording failed, is not downloaded again for the lifetime of the process.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    urls: DashSet<String>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn add(&self, url: impl Into<String>) {
        self.urls.insert(url.into());
    }

    /// Claim a URL for download.
    ///
    /// Returns `true` if the URL was not seen before. The check and insert are
    /// a single operation, so two workers offered the same URL cannot both win.
    pub fn try_claim(&self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
