//! Internal-link proposal and validation.
//!
//! The analysis model proposes links from the site's sitemap; every proposal
//! is then checked against the sitemap URL set so the article never links to
//! a page that does not exist.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use seoforge_llm::{Prompt, TextGenerator};
use seoforge_shared::{
    EditorialBrief, GenerationError, InternalLink, InternalLinkCandidate, Result, parse_structured,
};

/// Minimum path depth (in `/`-separated segments, scheme included) of a
/// substantive URL.
const SUBSTANTIVE_SEGMENTS: usize = 4;
/// Substantive URLs kept in the pool.
const MAX_SUBSTANTIVE: usize = 80;
/// URLs kept when falling back to the whole sitemap.
const FALLBACK_POOL: usize = 60;
/// URLs listed in the proposal prompt.
const PROMPT_URLS: usize = 70;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Outcome of validating a batch of proposals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkValidation {
    /// Accepted links, in proposal order, with trusted URLs.
    pub links: Vec<InternalLink>,
    /// Proposals that matched nothing in the trusted set.
    pub rejected: Vec<InternalLinkCandidate>,
}

/// Checks proposed links against a trusted URL inventory.
#[derive(Debug, Clone)]
pub struct LinkValidator {
    trusted: Vec<String>,
    exact: HashSet<String>,
}

impl LinkValidator {
    pub fn new<I, S>(trusted_urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let trusted: Vec<String> = trusted_urls.into_iter().map(Into::into).collect();
        let exact = trusted.iter().cloned().collect();
        Self { trusted, exact }
    }

    /// Map one candidate URL to its trusted form.
    ///
    /// Rules, first match wins: exact match; match ignoring a trailing slash;
    /// containment either way (stripped forms). Matches return the trusted
    /// URL, never the candidate's spelling.
    pub fn resolve(&self, candidate_url: &str) -> Option<&str> {
        let candidate = candidate_url.trim();
        if self.exact.contains(candidate) {
            return self.trusted.iter().find(|t| *t == candidate).map(String::as_str);
        }

        let stripped = strip_slash(candidate);
        if stripped.is_empty() {
            return None;
        }

        if let Some(t) = self.trusted.iter().find(|t| strip_slash(t) == stripped) {
            return Some(t.as_str());
        }

        self.trusted
            .iter()
            .find(|t| {
                let trusted = strip_slash(t);
                !trusted.is_empty() && (trusted.contains(stripped) || stripped.contains(trusted))
            })
            .map(String::as_str)
    }

    /// Validate candidates in order, dropping any that match nothing.
    pub fn validate(&self, candidates: &[InternalLinkCandidate]) -> LinkValidation {
        let mut report = LinkValidation::default();

        for candidate in candidates {
            match self.resolve(&candidate.url) {
                Some(url) => {
                    if url != candidate.url {
                        debug!(proposed = %candidate.url, trusted = %url, "link URL corrected");
                    }
                    report.links.push(InternalLink::accept(candidate, url));
                }
                None => {
                    warn!(url = %candidate.url, anchor = %candidate.anchor_text, "hallucinated internal link rejected");
                    report.rejected.push(candidate.clone());
                }
            }
        }

        report
    }
}

fn strip_slash(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// URLs offered to the model as link targets.
///
/// Deeper URLs are preferred over home and category pages. Only a sitemap
/// with no substantive URL at all falls back to its first entries.
pub fn candidate_pool(sitemap_urls: &[String]) -> Vec<String> {
    let substantive: Vec<String> = sitemap_urls
        .iter()
        .filter(|u| strip_slash(u).split('/').count() >= SUBSTANTIVE_SEGMENTS)
        .take(MAX_SUBSTANTIVE)
        .cloned()
        .collect();

    if substantive.is_empty() {
        sitemap_urls.iter().take(FALLBACK_POOL).cloned().collect()
    } else {
        substantive
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinkProposal {
    Wrapped {
        internal_links: Vec<InternalLinkCandidate>,
    },
    Bare(Vec<InternalLinkCandidate>),
}

impl LinkProposal {
    fn into_candidates(self) -> Vec<InternalLinkCandidate> {
        match self {
            Self::Wrapped { internal_links } => internal_links,
            Self::Bare(links) => links,
        }
    }
}

fn proposal_prompt(brief: &EditorialBrief, keyword: &str, pool: &[String]) -> Prompt {
    let sections = brief
        .sections
        .iter()
        .map(|s| {
            let mut block = format!("- [{}] H2: {}", s.id, s.h2);
            for sub in &s.subsections {
                block.push_str(&format!("\n  - [{}] H3: {}", sub.id, sub.h3));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n");

    let urls = pool
        .iter()
        .take(PROMPT_URLS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    Prompt::user(format!(
        r#"You are an expert in SEO INTERNAL LINKING.

ARTICLE BEING WRITTEN:
Main keyword: {keyword}
H1: {h1}

SECTION STRUCTURE (ids in brackets):
{sections}

SITE URLS AVAILABLE FOR INTERNAL LINKS:
{urls}

GOAL: pick 3 to 5 of these URLs to link naturally from the article.

RULES:
- Only use URLs from the list above, copied exactly
- Choose complementary pages that add real value for the reader
- Anchor text must be natural and descriptive (never "click here" or "read more")
- The anchor should carry relevant keywords
- Give the id of the section where each link belongs
- Each link must fit a precise sentence context

Reply ONLY with a valid JSON object, no text before or after:
{{
  "internal_links": [
    {{
      "url": "https://...",
      "anchor_text": "natural descriptive anchor",
      "target_section_id": "s1",
      "integration_hint": "Where and how to place the link"
    }}
  ]
}}"#,
        h1 = brief.h1,
    ))
}

/// Ask the model for internal links and keep only those on the site.
///
/// A generation or parse failure yields no links. Quota exhaustion is the
/// one error returned, since every later stage would hit it too.
#[instrument(skip_all, fields(keyword = %keyword, sitemap_urls = sitemap_urls.len()))]
pub async fn propose_internal_links(
    generator: &dyn TextGenerator,
    brief: &EditorialBrief,
    keyword: &str,
    sitemap_urls: &[String],
) -> Result<LinkValidation> {
    if sitemap_urls.is_empty() {
        info!("no sitemap URLs, skipping internal links");
        return Ok(LinkValidation::default());
    }

    let pool = candidate_pool(sitemap_urls);
    let raw = match generator
        .generate(&proposal_prompt(brief, keyword, &pool))
        .await
    {
        Ok(raw) => raw,
        Err(e @ GenerationError::QuotaExhausted { .. }) => {
            error!(error = %e, "generator quota exhausted during link proposal");
            return Err(e.into());
        }
        Err(e) => {
            warn!(error = %e, "internal link proposal failed, continuing without links");
            return Ok(LinkValidation::default());
        }
    };

    let candidates = match parse_structured::<LinkProposal>(&raw) {
        Ok(proposal) => proposal.into_candidates(),
        Err(e) => {
            warn!(error = %e, "internal link proposal unparsable, continuing without links");
            return Ok(LinkValidation::default());
        }
    };

    let report = LinkValidator::new(sitemap_urls.iter().map(String::as_str)).validate(&candidates);
    info!(
        accepted = report.links.len(),
        rejected = report.rejected.len(),
        "internal links validated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use seoforge_shared::Section;

    fn cand(url: &str) -> InternalLinkCandidate {
        InternalLinkCandidate {
            url: url.into(),
            anchor_text: format!("anchor for {url}"),
            target_section_id: "s1".into(),
            integration_hint: String::new(),
        }
    }

    #[test]
    fn canonicalizes_and_drops_hallucinations() {
        let validator = LinkValidator::new(["https://x.fr/a/b/c/", "https://x.fr/a/b/d"]);
        let report = validator.validate(&[
            cand("https://x.fr/a/b/c"),
            cand("https://x.fr/a/b/d/"),
            cand("https://x.fr/nope"),
        ]);

        let urls: Vec<&str> = report.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.fr/a/b/c/", "https://x.fr/a/b/d"]);
        assert_eq!(report.rejected, vec![cand("https://x.fr/nope")]);
        assert_eq!(report.links[0].anchor_text, "anchor for https://x.fr/a/b/c");
    }

    #[test]
    fn containment_both_ways_maps_to_trusted_url() {
        let validator = LinkValidator::new(["https://x.fr/blog/robots/guide-complet/"]);
        assert_eq!(
            validator.resolve("https://x.fr/blog/robots/guide"),
            Some("https://x.fr/blog/robots/guide-complet/")
        );
        assert_eq!(
            validator.resolve("https://x.fr/blog/robots/guide-complet/?utm=1"),
            Some("https://x.fr/blog/robots/guide-complet/")
        );
    }

    #[test]
    fn exact_match_wins_over_containment() {
        let validator = LinkValidator::new(["https://x.fr/a/long", "https://x.fr/a"]);
        assert_eq!(validator.resolve("https://x.fr/a"), Some("https://x.fr/a"));
        assert_eq!(validator.resolve(" https://x.fr/a/ "), Some("https://x.fr/a"));
    }

    #[test]
    fn empty_urls_never_match() {
        let validator = LinkValidator::new(["https://x.fr/a", ""]);
        assert_eq!(validator.resolve(""), None);
        assert_eq!(validator.resolve("/"), None);
        assert_eq!(validator.resolve("https://y.fr/zzz"), None);
    }

    #[test]
    fn revalidating_is_idempotent() {
        let validator = LinkValidator::new(["https://x.fr/a/b/c/", "https://x.fr/a/b/d"]);
        let first = validator.validate(&[cand("https://x.fr/a/b/c"), cand("https://x.fr/a/b/d/")]);
        let again: Vec<InternalLinkCandidate> =
            first.links.iter().cloned().map(Into::into).collect();
        let second = validator.validate(&again);
        assert_eq!(second.links, first.links);
        assert!(second.rejected.is_empty());
    }

    #[test]
    fn output_is_subset_of_trusted_and_never_longer() {
        let trusted = ["https://x.fr/a/b/", "https://x.fr/c/d", "https://x.fr/e"];
        let validator = LinkValidator::new(trusted);
        let inputs = [
            "https://x.fr/a/b",
            "https://x.fr/c",
            "https://x.fr/e/f/g",
            "https://other.fr/a/b",
            "",
            "https://x.fr/c/d/",
        ];
        let candidates: Vec<_> = inputs.iter().map(|u| cand(u)).collect();
        let report = validator.validate(&candidates);
        assert!(report.links.len() <= candidates.len());
        assert_eq!(report.links.len() + report.rejected.len(), candidates.len());
        for link in &report.links {
            assert!(trusted.contains(&link.url.as_str()), "{} not trusted", link.url);
        }
    }

    #[test]
    fn pool_prefers_deep_urls() {
        let mut urls: Vec<String> = vec![
            "https://x.fr/".into(),
            "https://x.fr/blog/".into(),
        ];
        urls.extend((0..100).map(|i| format!("https://x.fr/blog/post-{i}")));
        let pool = candidate_pool(&urls);
        assert_eq!(pool.len(), MAX_SUBSTANTIVE);
        assert_eq!(pool[0], "https://x.fr/blog/");
        assert_eq!(pool[1], "https://x.fr/blog/post-0");
        assert!(!pool.contains(&"https://x.fr/".to_string()));
    }

    #[test]
    fn pool_falls_back_to_whole_sitemap() {
        let urls: Vec<String> = vec!["https://x.fr/".into(), "https://x.fr".into()];
        assert_eq!(candidate_pool(&urls), urls);

        let many: Vec<String> = (0..100).map(|i| format!("https://x{i}.fr")).collect();
        assert_eq!(candidate_pool(&many).len(), FALLBACK_POOL);
    }

    #[test]
    fn single_deep_url_is_enough_for_the_pool() {
        let urls: Vec<String> = vec![
            "https://x.fr/".into(),
            "https://x.fr/blog/guide".into(),
            "https://y.fr".into(),
        ];
        assert_eq!(candidate_pool(&urls), vec!["https://x.fr/blog/guide".to_string()]);
    }

    struct Canned(std::result::Result<String, GenerationError>);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &Prompt) -> std::result::Result<String, GenerationError> {
            assert!(prompt.user.contains("INTERNAL LINKING"));
            self.0.clone()
        }
    }

    fn brief() -> EditorialBrief {
        EditorialBrief {
            h1: "Meilleur aspirateur robot".into(),
            meta_description: String::new(),
            intro_hook: String::new(),
            intro_key_points: Vec::new(),
            sections: vec![Section {
                id: "s1".into(),
                h2: "Comparatif".into(),
                lsi_terms: Vec::new(),
                key_points: Vec::new(),
                media_hint: String::new(),
                subsections: Vec::new(),
            }],
            faq: Vec::new(),
            conclusion_cta: String::new(),
        }
    }

    fn sitemap() -> Vec<String> {
        vec![
            "https://x.fr/blog/entretien/nettoyer-robot/".into(),
            "https://x.fr/blog/guides/choisir-aspirateur".into(),
            "https://x.fr/blog/guides/batterie".into(),
        ]
    }

    #[tokio::test]
    async fn proposals_are_validated_against_sitemap() {
        let generator = Canned(Ok(r#"{"internal_links": [
            {"url": "https://x.fr/blog/entretien/nettoyer-robot", "anchor_text": "nettoyer son robot", "target_section_id": "s1"},
            {"url": "https://x.fr/blog/invented-page", "anchor_text": "fake"}
        ]}"#
        .into()));
        let report = propose_internal_links(&generator, &brief(), "aspirateur robot", &sitemap())
            .await
            .unwrap();
        assert_eq!(report.links.len(), 1);
        assert_eq!(report.links[0].url, "https://x.fr/blog/entretien/nettoyer-robot/");
        assert_eq!(report.rejected.len(), 1);
    }

    #[tokio::test]
    async fn bare_array_is_accepted() {
        let generator = Canned(Ok(
            r#"[{"url": "https://x.fr/blog/guides/batterie", "anchor_text": "autonomie"}]"#.into(),
        ));
        let report = propose_internal_links(&generator, &brief(), "robot", &sitemap())
            .await
            .unwrap();
        assert_eq!(report.links.len(), 1);
    }

    #[tokio::test]
    async fn one_null_field_does_not_drop_every_link() {
        let generator = Canned(Ok(r#"{"internal_links": [
            {"url": "https://x.fr/blog/guides/batterie", "anchor_text": "autonomie", "integration_hint": null},
            {"url": "https://x.fr/blog/guides/choisir-aspirateur", "anchor_text": "bien choisir", "target_section_id": "s1"}
        ]}"#
        .into()));
        let report = propose_internal_links(&generator, &brief(), "robot", &sitemap())
            .await
            .unwrap();
        assert_eq!(report.links.len(), 2);
        assert!(report.links[0].integration_hint.is_empty());
    }

    #[tokio::test]
    async fn quota_exhaustion_is_returned() {
        let exhausted = Canned(Err(GenerationError::QuotaExhausted {
            model: "m".into(),
            detail: "429".into(),
        }));
        let err = propose_internal_links(&exhausted, &brief(), "robot", &sitemap())
            .await
            .unwrap_err();
        assert!(err.is_quota_exhausted());
    }

    #[tokio::test]
    async fn failures_degrade_to_no_links() {
        let failing = Canned(Err(GenerationError::TransientOverload {
            model: "m".into(),
            detail: "503".into(),
        }));
        assert_eq!(
            propose_internal_links(&failing, &brief(), "robot", &sitemap()).await.unwrap(),
            LinkValidation::default()
        );

        let garbage = Canned(Ok("no links today".into()));
        assert_eq!(
            propose_internal_links(&garbage, &brief(), "robot", &sitemap()).await.unwrap(),
            LinkValidation::default()
        );

        let unused = Canned(Ok("{}".into()));
        assert_eq!(
            propose_internal_links(&unused, &brief(), "robot", &[]).await.unwrap(),
            LinkValidation::default()
        );
    }
}
