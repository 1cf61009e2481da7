//! DuckDuckGo's JavaScript-free result page.

use std::sync::LazyLock;

use reqwest::header::REFERER;
use reqwest::{Client, RequestBuilder};
use scraper::{Html, Selector};
use seoforge_shared::ScrapingConfig;

use super::{SerpEngine, SerpHit, element_text, resolve_redirect};
use crate::policy::DomainDenylist;

/// Default DuckDuckGo HTML endpoint.
pub const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

const REDIRECT_BASE: &str = "https://duckduckgo.com/";

static RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.result").expect("valid selector"));
static TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid selector"));
static SNIPPET: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.result__snippet, div.result__snippet").expect("valid selector")
});

/// DuckDuckGo HTML search.
#[derive(Debug, Clone)]
pub struct DuckDuckGoEngine {
    endpoint: String,
    region: String,
}

impl DuckDuckGoEngine {
    /// `region` is DuckDuckGo's `kl` code, e.g. `fr-fr`.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            endpoint: DUCKDUCKGO_HTML_URL.into(),
            region: region.into(),
        }
    }

    /// Point the engine at another endpoint (mock servers in tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl From<&ScrapingConfig> for DuckDuckGoEngine {
    fn from(config: &ScrapingConfig) -> Self {
        Self::new(config.duckduckgo_region.clone())
    }
}

impl SerpEngine for DuckDuckGoEngine {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn request(&self, client: &Client, keyword: &str, _count: usize) -> RequestBuilder {
        client
            .post(&self.endpoint)
            .header(REFERER, REDIRECT_BASE)
            .form(&[("q", keyword), ("b", ""), ("kl", self.region.as_str())])
    }

    fn parse(&self, html: &str, denylist: &DomainDenylist) -> Vec<SerpHit> {
        let doc = Html::parse_document(html);

        doc.select(&RESULT)
            .filter_map(|result| {
                let link = result.select(&TITLE_LINK).next()?;
                let href = link.value().attr("href")?;
                let url = resolve_redirect(href, REDIRECT_BASE, &["uddg"]);
                if !denylist.allows(&url) {
                    return None;
                }
                let snippet = result
                    .select(&SNIPPET)
                    .next()
                    .map(|el| element_text(&el))
                    .unwrap_or_default();
                Some(SerpHit {
                    url,
                    title: element_text(&link),
                    snippet,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_and_decodes_redirects() {
        let html = r#"<div id="links">
          <div class="result results_links">
            <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fmaison.fr%2Frobot&amp;rut=1">Robot <b>aspirateur</b></a></h2>
            <a class="result__snippet" href="x">Notre   test complet.</a>
          </div>
          <div class="result"><a class="result__a" href="https://www.pinterest.com/pin/1">Pin</a></div>
          <div class="result"><span>no link</span></div>
          <div class="result"><a class="result__a" href="https://direct.fr/p">Direct</a>
            <div class="result__snippet">Texte</div></div>
        </div>"#;
        let hits = DuckDuckGoEngine::new("fr-fr").parse(html, &DomainDenylist::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://maison.fr/robot");
        assert_eq!(hits[0].title, "Robot aspirateur");
        assert_eq!(hits[0].snippet, "Notre test complet.");
        assert_eq!(hits[1].snippet, "Texte");
    }

    #[test]
    fn configured_engine_sends_full_region_code() {
        let engine = DuckDuckGoEngine::from(&ScrapingConfig::default());
        let request = engine
            .request(&Client::new(), "aspirateur robot", 3)
            .build()
            .unwrap();
        let body = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        assert!(body.contains("kl=fr-fr"), "{body}");
        assert!(body.contains("q=aspirateur+robot"), "{body}");
    }
}
