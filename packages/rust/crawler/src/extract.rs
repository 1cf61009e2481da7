//! Main-content text extraction from arbitrary HTML pages.
//!
//! Picks the most likely content container (`<article>`, `<main>`, an element
//! whose class mentions content/article/post/entry, then `<body>`), walks it
//! while skipping page chrome, and returns whitespace-collapsed text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use seoforge_shared::text::{collapse_whitespace, truncate_chars};

/// Elements whose text is never part of the main content.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "form", "noscript", "iframe",
    "svg", "template",
];

static ARTICLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article").expect("valid selector"));
static MAIN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("main").expect("valid selector"));
static WITH_CLASS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[class]").expect("valid selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

static CONTENT_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)content|article|post|entry").expect("valid content class regex")
});

/// Extract cleaned main-content text, truncated to `max_chars` characters.
pub fn extract_main_text(html: &str, max_chars: usize) -> String {
    let doc = Html::parse_document(html);

    let container = first_outside_noise(&doc, &ARTICLE)
        .or_else(|| first_outside_noise(&doc, &MAIN))
        .or_else(|| {
            doc.select(&WITH_CLASS).find(|el| {
                !is_noise(el)
                    && el
                        .value()
                        .attr("class")
                        .is_some_and(|class| CONTENT_CLASS.is_match(class))
            })
        })
        .or_else(|| doc.select(&BODY).next());

    let mut raw = String::new();
    match container {
        Some(el) => collect_text(el, &mut raw),
        None => collect_text(doc.root_element(), &mut raw),
    }

    let text = collapse_whitespace(&raw);
    truncate_chars(&text, max_chars).to_string()
}

fn first_outside_noise<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    doc.select(selector).find(|el| !is_noise(el))
}

/// True if the element is, or sits inside, page chrome.
fn is_noise(el: &ElementRef<'_>) -> bool {
    NOISE_TAGS.contains(&el.value().name())
        || el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| NOISE_TAGS.contains(&a.value().name()))
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !NOISE_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_article_and_strips_chrome() {
        let html = r#"<html><body>
            <header class="site-header">Logo menu</header>
            <nav>Accueil | Blog</nav>
            <article>
              <h1>Robot aspirateur</h1>
              <script>var tracking = 1;</script>
              <p>Un   robot
                 aspirateur nettoie seul.</p>
              <aside>Pub</aside>
            </article>
            <footer>Copyright</footer>
        </body></html>"#;
        let text = extract_main_text(html, 1000);
        assert_eq!(text, "Robot aspirateur Un robot aspirateur nettoie seul.");
    }

    #[test]
    fn falls_back_to_content_class() {
        let html = r#"<body>
            <nav class="post-nav">Précédent</nav>
            <div class="sidebar">Liens</div>
            <div class="entry-content"><p>Le vrai texte.</p></div>
        </body>"#;
        assert_eq!(extract_main_text(html, 1000), "Le vrai texte.");
    }

    #[test]
    fn falls_back_to_body_without_chrome() {
        let html = "<body><header>Top</header><p>Corps</p><footer>Bas</footer></body>";
        assert_eq!(extract_main_text(html, 1000), "Corps");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let html = "<main><p>éééééééééé</p></main>";
        assert_eq!(extract_main_text(html, 4), "éééé");
    }
}
