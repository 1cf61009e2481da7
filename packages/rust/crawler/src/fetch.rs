//! Page fetching with browser-like headers.
//!
//! [`PageFetcher::fetch_text`] never fails: any network, status or decoding
//! problem yields an empty string, which callers treat as "no content".

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use seoforge_shared::{Result, SeoForgeError};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::extract::extract_main_text;

/// Desktop browser User-Agent; search engines serve degraded pages to bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 5;

/// Build a client that looks like a French-locale desktop browser.
pub fn browser_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7"),
    );

    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| SeoForgeError::Network(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// Capability: fetch a page and return its cleaned main text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Cleaned text truncated to `max_chars`, or an empty string on any failure.
    async fn fetch_text(&self, url: &str, max_chars: usize) -> String;
}

/// [`PageFetcher`] over HTTP with private-network protection.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    /// Allow localhost/private IPs (for tests against local mock servers).
    allow_localhost: bool,
}

impl HttpPageFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: browser_client(timeout)?,
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost/private IPs (for tests against mock servers).
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let parsed =
            Url::parse(url).map_err(|e| SeoForgeError::validation(format!("{url}: {e}")))?;
        if !self.allow_localhost && is_ssrf_target(&parsed) {
            return Err(SeoForgeError::validation(format!(
                "{url}: private or local address refused"
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| SeoForgeError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SeoForgeError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| SeoForgeError::Network(format!("{url}: body read failed: {e}")))
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch_text(&self, url: &str, max_chars: usize) -> String {
        match self.fetch_html(url).await {
            Ok(html) => {
                let text = extract_main_text(&html, max_chars);
                debug!(chars = text.chars().count(), "page text extracted");
                text
            }
            Err(e) => {
                warn!(error = %e, "page fetch failed, using empty text");
                String::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a non-public resource.
pub(crate) fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
