//! HTTP client construction shared by the page inspector and the transport.

use std::{sync::OnceLock, time::Duration};

use tracing::{debug, warn};

use crate::Result;

/// Browser-like user agent sent when the configuration does not override it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Options for [`build_client`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub user_agent: Option<String>,
    /// Whole-request timeout. Zero disables it, which is what long-running
    /// stream downloads need.
    pub request_timeout: Duration,
    pub connect_timeout: Option<Duration>,
    pub proxy: Option<String>,
}

/// Build a `reqwest::Client` with rustls, optional proxy and timeouts.
///
/// An invalid proxy URL is logged and ignored rather than failing the build.
pub fn build_client(options: &ClientOptions) -> Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(
            options
                .user_agent
                .as_deref()
                .unwrap_or(DEFAULT_USER_AGENT)
                .to_string(),
        )
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90));

    if options.request_timeout > Duration::ZERO {
        builder = builder.timeout(options.request_timeout);
    }

    if let Some(connect_timeout) = options.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }

    match options.proxy.as_deref() {
        Some(url) => match reqwest::Proxy::all(url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(error) => {
                warn!(proxy_url = %url, error = %error, "Invalid proxy URL; disabling proxy");
                builder = builder.no_proxy();
            }
        },
        None => {
            // reqwest default behavior uses system/env proxy settings.
        }
    }

    Ok(builder.build()?)
}
