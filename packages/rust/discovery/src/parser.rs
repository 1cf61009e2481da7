//! Sitemap XML parsing.
//!
//! Sitemaps are flat enough that a `<loc>` scan is sufficient; the only
//! structural question is whether the document is an index of other
//! sitemaps or a `<urlset>` of pages.

use std::sync::LazyLock;

use regex::Regex;

static LOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").expect("valid loc regex"));

static SITEMAP_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:\w+:)?sitemapindex[\s>]").expect("valid index regex"));

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDoc {
    /// `<sitemapindex>`: locations of child sitemaps.
    Index(Vec<String>),
    /// `<urlset>`: page URLs.
    UrlSet(Vec<String>),
}

/// Parse a sitemap body into its `<loc>` values.
pub fn parse_sitemap(xml: &str) -> SitemapDoc {
    let locs: Vec<String> = LOC
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_xml(unwrap_cdata(m.as_str())))
        .filter(|loc| !loc.is_empty())
        .collect();

    if SITEMAP_INDEX.is_match(xml) {
        SitemapDoc::Index(locs)
    } else {
        SitemapDoc::UrlSet(locs)
    }
}

fn unwrap_cdata(raw: &str) -> &str {
    raw.trim()
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .map(str::trim)
        .unwrap_or_else(|| raw.trim())
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://x.fr/a</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc>
      https://x.fr/b?x=1&amp;y=2
  </loc></url>
</urlset>"#;
        assert_eq!(
            parse_sitemap(xml),
            SitemapDoc::UrlSet(vec![
                "https://x.fr/a".into(),
                "https://x.fr/b?x=1&y=2".into()
            ])
        );
    }

    #[test]
    fn parses_index_with_cdata() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc><![CDATA[https://x.fr/post-sitemap.xml]]></loc></sitemap>
  <sitemap><LOC>https://x.fr/page-sitemap.xml</LOC></sitemap>
</sitemapindex>"#;
        assert_eq!(
            parse_sitemap(xml),
            SitemapDoc::Index(vec![
                "https://x.fr/post-sitemap.xml".into(),
                "https://x.fr/page-sitemap.xml".into()
            ])
        );
    }

    #[test]
    fn non_sitemap_body_is_empty_urlset() {
        assert_eq!(
            parse_sitemap("<html><body>404</body></html>"),
            SitemapDoc::UrlSet(vec![])
        );
    }
}
