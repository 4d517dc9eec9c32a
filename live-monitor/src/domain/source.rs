//! Monitored source identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::filename::sanitize_component;
use crate::utils::url::{extract_host, last_path_segment, strip_query};

/// One monitored live page.
///
/// Identity is the page URL without its query string, so re-listing the same
/// room with different tracking parameters does not create a second source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    id: String,
    url: String,
    short_id: String,
}

impl Source {
    /// Parse a source from one line of the source list.
    ///
    /// Returns `None` for blank lines.
    pub fn parse(raw: &str) -> Option<Self> {
        let url = raw.trim();
        if url.is_empty() {
            return None;
        }

        let id = strip_query(url).to_string();
        let short_id = derive_short_id(&id);

        Some(Self {
            id,
            url: url.to_string(),
            short_id,
        })
    }

    /// Normalized page URL used as identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// URL as it appeared in the source list.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Filesystem-safe identifier used in recording filenames.
    pub fn short_id(&self) -> &str {
        &self.short_id
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

fn derive_short_id(id: &str) -> String {
    if let Some(segment) = last_path_segment(id) {
        return sanitize_component(segment);
    }
    match extract_host(id) {
        Some(host) => sanitize_component(&host),
        None => sanitize_component(id),
    }
}
