//! Google result pages.
//!
//! Google's markup drifts, so results are read in layers: the classic
//! `div.g` blocks, then the `data-hveid` containers of newer layouts, then
//! any `<h3>` sitting in or around a link. The first layer that yields a
//! usable result wins.

use std::sync::LazyLock;

use reqwest::{Client, RequestBuilder};
use scraper::{ElementRef, Html, Selector};
use seoforge_shared::ScrapingConfig;

use super::{SerpEngine, SerpHit, element_text, resolve_redirect};
use crate::policy::DomainDenylist;

/// Default Google endpoint.
pub const GOOGLE_SEARCH_URL: &str = "https://www.google.fr/search";

/// Extra results requested so denylisted entries don't starve the count.
const OVERFETCH: usize = 5;

const REDIRECT_BASE: &str = "https://www.google.fr/";

static DIV_G: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.g").expect("valid selector"));
static HVEID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-hveid]").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static H3: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").expect("valid selector"));
static SNIPPET: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div[data-sncf], div.VwiC3b, span.aCOpRe").expect("valid selector")
});

/// Google web search.
#[derive(Debug, Clone)]
pub struct GoogleEngine {
    endpoint: String,
    language: String,
    region: String,
}

impl GoogleEngine {
    /// `language`/`region` become the `hl`/`gl` query parameters.
    pub fn new(language: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            endpoint: GOOGLE_SEARCH_URL.into(),
            language: language.into(),
            region: region.into(),
        }
    }

    /// Point the engine at another endpoint (mock servers in tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl From<&ScrapingConfig> for GoogleEngine {
    fn from(config: &ScrapingConfig) -> Self {
        Self::new(config.search_language.clone(), config.search_region.clone())
    }
}

impl SerpEngine for GoogleEngine {
    fn name(&self) -> &str {
        "google"
    }

    fn request(&self, client: &Client, keyword: &str, count: usize) -> RequestBuilder {
        let num = (count + OVERFETCH).to_string();
        client.get(&self.endpoint).query(&[
            ("q", keyword),
            ("hl", self.language.as_str()),
            ("gl", self.region.as_str()),
            ("num", num.as_str()),
        ])
    }

    fn parse(&self, html: &str, denylist: &DomainDenylist) -> Vec<SerpHit> {
        let doc = Html::parse_document(html);

        let classic: Vec<SerpHit> = doc
            .select(&DIV_G)
            .filter_map(|block| block_hit(block, true, denylist))
            .collect();
        if !classic.is_empty() {
            return classic;
        }

        let hveid: Vec<SerpHit> = doc
            .select(&HVEID)
            .filter_map(|block| block_hit(block, false, denylist))
            .collect();
        if !hveid.is_empty() {
            return hveid;
        }

        doc.select(&H3)
            .filter_map(|h3| {
                let link = h3
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|a| a.value().name() == "a" && a.value().attr("href").is_some())
                    .or_else(|| h3.select(&LINK).next())?;
                let url = resolve(link.value().attr("href")?);
                denylist.allows(&url).then(|| SerpHit {
                    url,
                    title: element_text(&h3),
                    snippet: String::new(),
                })
            })
            .collect()
    }
}

/// A result block needs a link and an `<h3>` title.
fn block_hit(block: ElementRef<'_>, with_snippet: bool, denylist: &DomainDenylist) -> Option<SerpHit> {
    let link = block.select(&LINK).next()?;
    let h3 = block.select(&H3).next()?;
    let url = resolve(link.value().attr("href")?);
    if !denylist.allows(&url) {
        return None;
    }
    let snippet = if with_snippet {
        block
            .select(&SNIPPET)
            .next()
            .map(|el| element_text(&el))
            .unwrap_or_default()
    } else {
        String::new()
    };
    Some(SerpHit {
        url,
        title: element_text(&h3),
        snippet,
    })
}

fn resolve(href: &str) -> String {
    resolve_redirect(href, REDIRECT_BASE, &["q", "url"])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GoogleEngine {
        GoogleEngine::new("fr", "fr")
    }

    #[test]
    fn configured_engine_sends_language_and_region() {
        let request = GoogleEngine::from(&ScrapingConfig::default())
            .request(&Client::new(), "aspirateur robot", 3)
            .build()
            .unwrap();
        let query = request.url().query().unwrap_or_default().to_string();
        assert!(query.contains("hl=fr"), "{query}");
        assert!(query.contains("gl=fr"), "{query}");
        assert!(query.contains("num="), "{query}");
    }

    #[test]
    fn parses_classic_layout_with_snippets() {
        let html = r#"<html><body>
          <div class="g"><a href="https://www.youtube.com/watch?v=1"><h3>Vidéo</h3></a></div>
          <div class="g">
            <a href="https://robots-maison.fr/comparatif"><h3>Comparatif 2025</h3></a>
            <div class="VwiC3b">Les   meilleurs robots testés.</div>
          </div>
          <div class="g"><a href="/url?q=https://blog.fr/guide&amp;sa=U"><h3>Guide</h3></a></div>
        </body></html>"#;
        let hits = engine().parse(html, &DomainDenylist::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://robots-maison.fr/comparatif");
        assert_eq!(hits[0].title, "Comparatif 2025");
        assert_eq!(hits[0].snippet, "Les meilleurs robots testés.");
        assert_eq!(hits[1].url, "https://blog.fr/guide");
    }

    #[test]
    fn falls_back_to_hveid_layout() {
        let html = r#"<div data-hveid="CA"><a href="https://site.fr/a"><h3>A</h3></a></div>"#;
        let hits = engine().parse(html, &DomainDenylist::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].snippet, "");
    }

    #[test]
    fn falls_back_to_any_heading_link() {
        let html = r#"<section><a href="https://site.fr/b"><span><h3>B</h3></span></a>
                      <h3><a href="https://site.fr/c">C</a></h3></section>"#;
        let hits = engine().parse(html, &DomainDenylist::default());
        let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["https://site.fr/b", "https://site.fr/c"]);
    }

    #[test]
    fn denylisted_only_layer_falls_through() {
        let html = r#"<div class="g"><a href="https://fr.wikipedia.org/x"><h3>W</h3></a></div>
                      <div data-hveid="1"><a href="https://site.fr/ok"><h3>Ok</h3></a></div>"#;
        let hits = engine().parse(html, &DomainDenylist::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://site.fr/ok");
    }
}
