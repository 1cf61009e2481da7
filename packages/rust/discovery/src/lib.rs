//! Site inventory discovery: sitemap listing and keyword sheet ingestion.
//!
//! The sitemap gives each run its trusted URL universe (covered topics for
//! keyword selection, ground truth for internal links). The keyword sheet
//! gives the candidates the run chooses from.

mod keywords;
mod parser;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use seoforge_shared::{Result, SeoForgeError};
use tracing::{debug, info, instrument, warn};

pub use keywords::parse_keyword_csv;
pub use parser::{SitemapDoc, parse_sitemap};

/// Maximum number of redirects to follow when fetching a sitemap.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for sitemap requests.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Deepest sitemap level followed (root is 0).
const DEFAULT_MAX_DEPTH: usize = 2;

/// Child sitemaps followed per index.
const DEFAULT_MAX_CHILDREN: usize = 8;

/// User-Agent string for sitemap requests.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; SeoForge/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

// ---------------------------------------------------------------------------
// SitemapSource
// ---------------------------------------------------------------------------

/// Capability: list the page URLs a site publishes.
#[async_trait]
pub trait SitemapSource: Send + Sync {
    /// Ordered, de-duplicated page URLs reachable from `root`.
    async fn list_urls(&self, root: &str) -> Result<Vec<String>>;
}

/// Configuration for sitemap fetching.
#[derive(Debug, Clone)]
pub struct SitemapOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
    /// Deepest index level followed.
    pub max_depth: usize,
    /// Child sitemaps followed per index.
    pub max_children: usize,
}

impl Default for SitemapOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_depth: DEFAULT_MAX_DEPTH,
            max_children: DEFAULT_MAX_CHILDREN,
        }
    }
}

/// [`SitemapSource`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSitemapSource {
    client: Client,
    opts: SitemapOptions,
}

impl HttpSitemapSource {
    /// Build a source with its own HTTP client.
    pub fn new(opts: SitemapOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| SeoForgeError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, opts })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
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
            .map_err(|e| SeoForgeError::Network(format!("{url}: failed to read body: {e}")))
    }
}

#[async_trait]
impl SitemapSource for HttpSitemapSource {
    /// Walks indexes depth-first so page order follows the index order.
    /// A failing root is an error; failing children are skipped.
    #[instrument(skip_all, fields(root = %root))]
    async fn list_urls(&self, root: &str) -> Result<Vec<String>> {
        let mut pending: Vec<(String, usize)> = vec![(root.to_string(), 0)];
        let mut seen_sitemaps: HashSet<String> = HashSet::new();
        let mut seen_pages: HashSet<String> = HashSet::new();
        let mut pages: Vec<String> = Vec::new();

        while let Some((url, depth)) = pending.pop() {
            if depth > self.opts.max_depth || !seen_sitemaps.insert(url.clone()) {
                continue;
            }

            let body = match self.fetch(&url).await {
                Ok(body) => body,
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    warn!(sitemap = %url, error = %e, "child sitemap failed, skipping");
                    continue;
                }
            };

            match parse_sitemap(&body) {
                SitemapDoc::Index(children) => {
                    debug!(sitemap = %url, children = children.len(), "sitemap index");
                    // Reversed so the first child is popped first.
                    for child in children.into_iter().take(self.opts.max_children).rev() {
                        pending.push((child, depth + 1));
                    }
                }
                SitemapDoc::UrlSet(locs) => {
                    for loc in locs {
                        if seen_pages.insert(loc.clone()) {
                            pages.push(loc);
                        }
                    }
                }
            }
        }

        info!(pages = pages.len(), "sitemap listed");
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urlset(locs: &[String]) -> String {
        let body: String = locs
            .iter()
            .map(|l| format!("<url><loc>{l}</loc></url>"))
            .collect();
        format!(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{body}</urlset>"#)
    }

    fn index(locs: &[String]) -> String {
        let body: String = locs
            .iter()
            .map(|l| format!("<sitemap><loc>{l}</loc></sitemap>"))
            .collect();
        format!(r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{body}</sitemapindex>"#)
    }

    async fn mount(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn lists_plain_urlset() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount(
            &server,
            "/sitemap.xml",
            urlset(&[format!("{base}/a"), format!("{base}/b"), format!("{base}/a")]),
        )
        .await;

        let source = HttpSitemapSource::new(SitemapOptions::default()).unwrap();
        let urls = source
            .list_urls(&format!("{base}/sitemap.xml"))
            .await
            .unwrap();
        assert_eq!(urls, vec![format!("{base}/a"), format!("{base}/b")]);
    }

    #[tokio::test]
    async fn follows_index_in_order_and_skips_broken_child() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount(
            &server,
            "/sitemap_index.xml",
            index(&[
                format!("{base}/posts.xml"),
                format!("{base}/missing.xml"),
                format!("{base}/pages.xml"),
            ]),
        )
        .await;
        mount(&server, "/posts.xml", urlset(&[format!("{base}/blog/p1")])).await;
        mount(&server, "/pages.xml", urlset(&[format!("{base}/contact")])).await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpSitemapSource::new(SitemapOptions::default()).unwrap();
        let urls = source
            .list_urls(&format!("{base}/sitemap_index.xml"))
            .await
            .unwrap();
        assert_eq!(
            urls,
            vec![format!("{base}/blog/p1"), format!("{base}/contact")]
        );
    }

    #[tokio::test]
    async fn caps_children_per_index() {
        let server = MockServer::start().await;
        let base = server.uri();
        let children: Vec<String> = (0..10).map(|i| format!("{base}/c{i}.xml")).collect();
        mount(&server, "/index.xml", index(&children)).await;
        for i in 0..10 {
            mount(
                &server,
                &format!("/c{i}.xml"),
                urlset(&[format!("{base}/page{i}")]),
            )
            .await;
        }

        let source = HttpSitemapSource::new(SitemapOptions::default()).unwrap();
        let urls = source.list_urls(&format!("{base}/index.xml")).await.unwrap();
        assert_eq!(urls.len(), 8);
        assert_eq!(urls[0], format!("{base}/page0"));
    }

    #[tokio::test]
    async fn stops_at_max_depth() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount(&server, "/l0.xml", index(&[format!("{base}/l1.xml")])).await;
        mount(&server, "/l1.xml", index(&[format!("{base}/l2.xml")])).await;
        mount(&server, "/l2.xml", index(&[format!("{base}/l3.xml")])).await;
        mount(&server, "/l3.xml", urlset(&[format!("{base}/too-deep")])).await;

        let source = HttpSitemapSource::new(SitemapOptions::default()).unwrap();
        let urls = source.list_urls(&format!("{base}/l0.xml")).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn root_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpSitemapSource::new(SitemapOptions::default()).unwrap();
        let result = source
            .list_urls(&format!("{}/sitemap.xml", server.uri()))
            .await;
        assert!(matches!(result, Err(SeoForgeError::Network(_))));
    }
}
