//! Search engine result-page adapters.
//!
//! Each engine knows how to build its query request and how to read organic
//! results out of its HTML. Everything else (block detection, page fetching,
//! pacing) is shared in [`crate::serp`].

mod duckduckgo;
mod google;

use reqwest::{Client, RequestBuilder};
use scraper::ElementRef;
use url::Url;

use crate::policy::DomainDenylist;

pub use duckduckgo::DuckDuckGoEngine;
pub use google::GoogleEngine;

/// One organic result as listed on the result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerpHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Trait for engine-specific query building and result parsing.
pub trait SerpEngine: Send + Sync {
    /// Engine name for tracing and provenance.
    fn name(&self) -> &str;

    /// Build the result-page request for `keyword`, asking for about `count` results.
    fn request(&self, client: &Client, keyword: &str, count: usize) -> RequestBuilder;

    /// Parse organic results, dropping URLs the denylist refuses.
    fn parse(&self, html: &str, denylist: &DomainDenylist) -> Vec<SerpHit>;
}

/// Text content of an element, whitespace-collapsed.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    seoforge_shared::text::collapse_whitespace(&el.text().collect::<String>())
}

/// Follow engine redirect links (`/url?q=...`, `//duckduckgo.com/l/?uddg=...`)
/// to the target URL; other hrefs are returned unchanged.
pub(crate) fn resolve_redirect(href: &str, base: &str, params: &[&str]) -> String {
    let Ok(base) = Url::parse(base) else {
        return href.to_string();
    };
    let Ok(joined) = base.join(href) else {
        return href.to_string();
    };
    if joined.host_str() != base.host_str() {
        return href.to_string();
    }
    joined
        .query_pairs()
        .find(|(key, _)| params.contains(&key.as_ref()))
        .map(|(_, value)| value.into_owned())
        .filter(|target| target.starts_with("http"))
        .unwrap_or_else(|| href.to_string())
}
