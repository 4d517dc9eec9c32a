//! HTTP page inspector.
//!
//! Fetches the page with a browser-like client and scans the returned
//! document for stream endpoints. Pages that only reveal their stream after
//! running scripts need a browser-backed [`PageInspector`] instead.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use tracing::{debug, instrument};

use super::extract::find_stream_candidates;
use super::{InspectorSession, PageInspector};
use crate::domain::Source;
use crate::utils::http_client::{ClientOptions, build_client};
use crate::{Error, Result};

const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// [`PageInspector`] backed by plain HTTP requests.
#[derive(Clone)]
pub struct HttpPageInspector {
    client: reqwest::Client,
}

impl HttpPageInspector {
    pub fn new(options: &ClientOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(options)?,
        })
    }
}

#[async_trait]
impl PageInspector for HttpPageInspector {
    #[instrument(skip_all, fields(source = %source))]
    async fn open_session(&self, source: &Source) -> Result<Box<dyn InspectorSession>> {
        let body = fetch_page(&self.client, source.url())
            .await
            .map_err(|e| Error::session(format!("failed to load {}: {}", source.url(), e)))?;

        debug!(bytes = body.len(), "Inspector session opened");

        Ok(Box::new(HttpInspectorSession {
            client: self.client.clone(),
            page_url: source.url().to_string(),
            body,
        }))
    }
}

/// Session holding the most recently fetched page body.
pub struct HttpInspectorSession {
    client: reqwest::Client,
    page_url: String,
    body: String,
}

#[async_trait]
impl InspectorSession for HttpInspectorSession {
    async fn refresh(&mut self) -> Result<()> {
        self.body = fetch_page(&self.client, &self.page_url)
            .await
            .map_err(|e| Error::sample(format!("failed to refresh {}: {}", self.page_url, e)))?;
        Ok(())
    }

    async fn sample_stream_candidate(&mut self) -> Result<Option<String>> {
        Ok(find_stream_candidates(&self.body).into_iter().next())
    }
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .header(ACCEPT, PAGE_ACCEPT)
        .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response.text().await?)
}
