//! Article output shaping: split the writer's dual-format answer into clean
//! Markdown and HTML.
//!
//! The writing model is asked to emit both formats between fixed markers.
//! When a block is missing, the other one is converted (`htmd` for HTML to
//! Markdown, `pulldown-cmark` for Markdown to HTML). The Markdown always
//! starts with a YAML front matter block and the HTML always has a single
//! `<article>` root.

mod cleanup;

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, instrument, warn};

use seoforge_shared::{Result, SeoForgeError};

pub use cleanup::run_pipeline as clean_markdown;

/// Opening marker of the Markdown block.
pub const MARKDOWN_START: &str = "===MARKDOWN===";
/// Closing marker of the Markdown block.
pub const MARKDOWN_END: &str = "===END MARKDOWN===";
/// Opening marker of the HTML block.
pub const HTML_START: &str = "===HTML===";
/// Closing marker of the HTML block.
pub const HTML_END: &str = "===END HTML===";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Front matter fields injected when the model omits them.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    pub title: String,
    pub date: NaiveDate,
    pub description: String,
    pub tags: Vec<String>,
    pub slug: String,
}

/// The two renditions of one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleParts {
    /// Markdown with front matter, cleaned.
    pub markdown: String,
    /// HTML with a single `<article>` root.
    pub html: String,
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Split raw writer output into Markdown and HTML.
#[instrument(skip_all, fields(raw_len = raw.len(), slug = %front.slug))]
pub fn split_article_output(raw: &str, front: &FrontMatter) -> Result<ArticleParts> {
    static MD_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)===MARKDOWN===\s*(.*?)\s*===END MARKDOWN===").expect("valid regex")
    });
    static HTML_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)===HTML===\s*(.*?)\s*===END HTML===").expect("valid regex")
    });

    let md_block = MD_RE.captures(raw).map(|c| strip_code_fence(&c[1]).to_string());
    let html_block = HTML_RE.captures(raw).map(|c| strip_code_fence(&c[1]).to_string());

    let body = match (md_block, &html_block) {
        (Some(md), _) => md,
        (None, Some(html)) => {
            warn!("markdown block missing, converting the HTML block");
            html_to_markdown(html)?
        }
        (None, None) => {
            warn!("no output markers found, using the raw answer as markdown");
            raw.trim().to_string()
        }
    };

    let markdown = if has_frontmatter(&body) {
        body
    } else {
        debug!("front matter missing, injecting it");
        format!("{}\n{body}", build_frontmatter(front))
    };
    let markdown = cleanup::run_pipeline(&markdown);

    let html = match html_block {
        Some(html) => html,
        None => {
            warn!("HTML block missing, rendering the markdown");
            markdown_to_html(strip_frontmatter(&markdown))
        }
    };

    Ok(ArticleParts {
        markdown,
        html: ensure_article_root(&html),
    })
}

/// Drop a surrounding ```` ```lang ```` fence some models wrap blocks in.
fn strip_code_fence(block: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("valid regex")
    });

    let block = block.trim();
    match FENCE_RE.captures(block).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => block,
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Convert HTML to Markdown with `htmd`.
pub fn html_to_markdown(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "iframe"])
        .build();

    converter
        .convert(html)
        .map_err(|e| SeoForgeError::Conversion(format!("htmd conversion failed: {e}")))
}

/// Render Markdown to HTML with `pulldown-cmark` (tables and strikethrough on).
pub fn markdown_to_html(md: &str) -> String {
    use pulldown_cmark::{Options, Parser, html};

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(md.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(md, options));
    out
}

/// Make `<article>` the single root element.
///
/// Output already shaped that way is returned trimmed. Otherwise every
/// `<article>` tag is removed and the content is wrapped in a fresh one.
pub fn ensure_article_root(html: &str) -> String {
    static OPEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<article(?:\s[^>]*)?>").expect("valid regex"));
    static CLOSE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</article\s*>").expect("valid regex"));

    let html = html.trim();
    let opens: Vec<_> = OPEN_RE.find_iter(html).collect();
    let closes = CLOSE_RE.find_iter(html).count();

    if opens.len() == 1 && closes == 1 && opens[0].start() == 0 {
        let lower = html.to_ascii_lowercase();
        if lower.trim_end().ends_with("</article>") {
            return html.to_string();
        }
    }

    let inner = OPEN_RE.replace_all(html, "");
    let inner = CLOSE_RE.replace_all(&inner, "");
    format!("<article>\n{}\n</article>", inner.trim())
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

/// Whether `md` opens with a `---` delimited block.
pub fn has_frontmatter(md: &str) -> bool {
    frontmatter_end(md).is_some()
}

/// The Markdown body after any front matter block.
pub fn strip_frontmatter(md: &str) -> &str {
    match frontmatter_end(md) {
        Some(end) => md[end..].trim_start_matches(['\r', '\n']),
        None => md,
    }
}

/// Byte offset just past the closing `---` line.
fn frontmatter_end(md: &str) -> Option<usize> {
    let rest = md.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    let offset = md.len() - rest.len();

    let mut pos = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(offset + pos + line.len());
        }
        pos += line.len();
    }
    None
}

/// Render a YAML front matter block.
pub fn build_frontmatter(front: &FrontMatter) -> String {
    let tags = front
        .tags
        .iter()
        .map(|t| format!("\"{}\"", escape_yaml_string(t)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut fm = String::from("---\n");
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(&front.title)));
    fm.push_str(&format!("date: {}\n", front.date.format("%Y-%m-%d")));
    fm.push_str(&format!(
        "description: \"{}\"\n",
        escape_yaml_string(&front.description)
    ));
    fm.push_str(&format!("tags: [{tags}]\n"));
    fm.push_str(&format!("slug: \"{}\"\n", escape_yaml_string(&front.slug)));
    fm.push_str("---\n");
    fm
}

/// Escape special characters in a double-quoted YAML string.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
}

/// Count words in the Markdown body, ignoring front matter and code blocks.
pub fn count_words(md: &str) -> usize {
    static CODE_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    let body = strip_frontmatter(md);
    let without_code = CODE_BLOCK_RE.replace_all(body, " ");
    let without_tags = TAG_RE.replace_all(&without_code, " ");
    without_tags
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn front() -> FrontMatter {
        FrontMatter {
            title: "Meilleur aspirateur robot : le guide".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            description: "Comparatif \"complet\" des robots".into(),
            tags: vec!["aspirateur robot".into(), "maison".into()],
            slug: "meilleur-aspirateur-robot".into(),
        }
    }

    #[test]
    fn splits_both_blocks() {
        let raw = "Voici l'article.\n===MARKDOWN===\n---\ntitle: \"T\"\n---\n\n# Titre\n\nTexte.\n===END MARKDOWN===\n\n===HTML===\n<article>\n<h1>Titre</h1>\n</article>\n===END HTML===\nFin.";
        let parts = split_article_output(raw, &front()).unwrap();

        assert!(parts.markdown.starts_with("---\ntitle: \"T\"\n---"));
        assert!(parts.markdown.contains("# Titre"));
        assert!(!parts.markdown.contains("Voici"));
        assert!(parts.markdown.ends_with("Texte.\n"));
        assert_eq!(parts.html, "<article>\n<h1>Titre</h1>\n</article>");
    }

    #[test]
    fn injects_frontmatter_when_missing() {
        let raw = "===MARKDOWN===\n# Titre\n\nCorps.\n===END MARKDOWN===\n===HTML===\n<h1>Titre</h1>\n===END HTML===";
        let parts = split_article_output(raw, &front()).unwrap();

        assert!(parts.markdown.starts_with("---\ntitle: \"Meilleur aspirateur robot : le guide\"\n"));
        assert!(parts.markdown.contains("date: 2026-03-14\n"));
        assert!(parts.markdown.contains("description: \"Comparatif \\\"complet\\\" des robots\"\n"));
        assert!(parts.markdown.contains("tags: [\"aspirateur robot\", \"maison\"]\n"));
        assert!(parts.markdown.contains("slug: \"meilleur-aspirateur-robot\"\n---\n"));
        assert!(parts.markdown.contains("# Titre"));
        assert_eq!(parts.html, "<article>\n<h1>Titre</h1>\n</article>");
    }

    #[test]
    fn missing_html_block_renders_markdown() {
        let raw = "===MARKDOWN===\n# Titre\n\nUn **paragraphe**.\n===END MARKDOWN===";
        let parts = split_article_output(raw, &front()).unwrap();

        assert!(parts.html.starts_with("<article>\n"));
        assert!(parts.html.ends_with("\n</article>"));
        assert!(parts.html.contains("<h1>Titre</h1>"));
        assert!(parts.html.contains("<strong>paragraphe</strong>"));
        assert!(!parts.html.contains("slug:"), "front matter leaked into HTML");
    }

    #[test]
    fn missing_markdown_block_converts_html() {
        let raw = "===HTML===\n<article><h1>Titre</h1><p>Du texte.</p></article>\n===END HTML===";
        let parts = split_article_output(raw, &front()).unwrap();

        assert!(parts.markdown.starts_with("---\n"));
        assert!(parts.markdown.contains("# Titre"));
        assert!(parts.markdown.contains("Du texte."));
    }

    #[test]
    fn no_markers_uses_raw_text() {
        let raw = "  # Titre\n\nTout le texte sans marqueurs.  ";
        let parts = split_article_output(raw, &front()).unwrap();

        assert!(parts.markdown.contains("Tout le texte sans marqueurs."));
        assert!(parts.markdown.starts_with("---\n"));
        assert!(parts.html.contains("<h1>Titre</h1>"));
    }

    #[test]
    fn strips_wrapping_code_fences() {
        let raw = "===MARKDOWN===\n```markdown\n# Titre\n```\n===END MARKDOWN===\n===HTML===\n```html\n<article><p>x</p></article>\n```\n===END HTML===";
        let parts = split_article_output(raw, &front()).unwrap();
        assert!(!parts.markdown.contains("```"));
        assert_eq!(parts.html, "<article><p>x</p></article>");
    }

    #[test]
    fn article_root_is_unique() {
        assert_eq!(ensure_article_root("<p>a</p>"), "<article>\n<p>a</p>\n</article>");
        assert_eq!(
            ensure_article_root("<article class=\"post\"><p>a</p></article>"),
            "<article class=\"post\"><p>a</p></article>"
        );
        let doubled = ensure_article_root("<article><p>a</p></article>\n<article><p>b</p></article>");
        assert_eq!(doubled.matches("<article>").count(), 1);
        assert_eq!(doubled.matches("</article>").count(), 1);
        assert!(doubled.contains("<p>a</p>") && doubled.contains("<p>b</p>"));

        let trailing = ensure_article_root("<article><p>a</p></article><p>after</p>");
        assert!(trailing.starts_with("<article>\n") && trailing.ends_with("</article>"));
        assert_eq!(trailing.matches("</article>").count(), 1);
    }

    #[test]
    fn frontmatter_detection_and_stripping() {
        let md = "---\ntitle: \"x\"\n---\n\n# Body";
        assert!(has_frontmatter(md));
        assert_eq!(strip_frontmatter(md), "# Body");

        assert!(!has_frontmatter("# No front matter\n---\n"));
        assert!(!has_frontmatter("---\nnever closed"));
        assert_eq!(strip_frontmatter("# Plain"), "# Plain");
    }

    #[test]
    fn word_count_ignores_frontmatter_code_and_tags() {
        let md = "---\ntitle: \"a b c d\"\n---\n# Un titre\n\nDeux mots.\n\n```\nignored code words\n```\n<figure><img src=\"\" alt=\"x\"></figure>";
        assert_eq!(count_words(md), 4);
    }
}
