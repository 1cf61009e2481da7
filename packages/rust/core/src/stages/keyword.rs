//! Keyword selection: pick the one keyword this run targets.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use seoforge_llm::{Prompt, TextGenerator};
use seoforge_shared::text::{slug_words, truncate_chars};
use seoforge_shared::{KeywordCandidate, Result, SelectedKeyword, SeoForgeError};

use super::ask_structured;

/// Sheet rows shown to the model.
const MAX_CANDIDATES: usize = 100;
/// Most recent sitemap URLs turned into covered topics.
const COVERED_TOPICS: usize = 60;
/// Category context characters included in the prompt.
const CATEGORY_CHARS: usize = 2500;

/// Chooses the keyword to write about from the sheet.
pub struct KeywordSelector {
    generator: Arc<dyn TextGenerator>,
    language: String,
}

impl KeywordSelector {
    pub fn new(generator: Arc<dyn TextGenerator>, language: impl Into<String>) -> Self {
        Self {
            generator,
            language: language.into(),
        }
    }

    /// Ask the model for the best keyword, then reconcile it with the sheet.
    ///
    /// Fails when the model gives no usable answer or an empty keyword.
    #[instrument(skip_all, fields(candidates = candidates.len(), sitemap_urls = sitemap_urls.len()))]
    pub async fn select(
        &self,
        candidates: &[KeywordCandidate],
        sitemap_urls: &[String],
        category_context: &str,
    ) -> Result<SelectedKeyword> {
        if candidates.is_empty() {
            return Err(SeoForgeError::validation("the keyword sheet is empty"));
        }

        let prompt = self.prompt(candidates, sitemap_urls, category_context)?;
        let mut selected: SelectedKeyword =
            ask_structured(self.generator.as_ref(), &prompt).await??;

        selected.text = selected.text.trim().to_string();
        if selected.text.is_empty() {
            return Err(SeoForgeError::validation("the model chose an empty keyword"));
        }
        reconcile(&mut selected, candidates);

        info!(keyword = %selected.text, volume = selected.volume, intent = %selected.search_intent, "keyword selected");
        Ok(selected)
    }

    fn prompt(
        &self,
        candidates: &[KeywordCandidate],
        sitemap_urls: &[String],
        category_context: &str,
    ) -> Result<Prompt> {
        let shown = &candidates[..candidates.len().min(MAX_CANDIDATES)];
        let records = serde_json::to_string_pretty(shown)
            .map_err(|e| SeoForgeError::parse(format!("failed to serialize keywords: {e}")))?;

        let start = sitemap_urls.len().saturating_sub(COVERED_TOPICS);
        let covered = sitemap_urls[start..]
            .iter()
            .map(|url| slug_words(url))
            .filter(|topic| !topic.is_empty())
            .map(|topic| format!("- {topic}"))
            .collect::<Vec<_>>()
            .join("\n");

        let category = if category_context.trim().is_empty() {
            String::new()
        } else {
            format!(
                "\nCATEGORY / TARGET PAGE CONTEXT:\n{}\n",
                truncate_chars(category_context.trim(), CATEGORY_CHARS)
            )
        };

        Ok(Prompt::user(format!(
            r#"You are an SEO expert specialised in content strategy.

KEYWORD CANDIDATES (with statistics):
{records}

TOPICS ALREADY COVERED BY THE SITE (inferred from sitemap URLs):
{covered}
{category}
GOAL: select THE BEST keyword to target with a new blog article written in {language}.

SELECTION CRITERIA (by priority):
1. Clear, actionable search intent (informational or commercial)
2. Reasonable search volume (strong potential without being impossible to rank)
3. NOT already covered by an existing page of the site
4. Relevant to the category context (if provided)
5. Conversion potential or value for the reader
6. Prefer long-tail keywords with a precise intent

Reply ONLY with a valid JSON object, no text before or after:
{{
  "keyword": "the chosen keyword exactly as written in the list",
  "volume": 0,
  "difficulty": 0,
  "reason": "Concise explanation of the choice (2-3 sentences)",
  "search_intent": "informational|commercial|transactional|navigational",
  "target_audience": "Precise description of the target audience",
  "semantic_variants": ["variant 1", "variant 2", "variant 3", "variant 4"],
  "angle_editorial": "The original, differentiating angle for this article"
}}"#,
            language = self.language,
        )))
    }
}

/// Fill missing statistics from the sheet row matching the chosen keyword.
fn reconcile(selected: &mut SelectedKeyword, candidates: &[KeywordCandidate]) {
    let wanted = selected.text.to_lowercase();
    let Some(row) = candidates
        .iter()
        .find(|c| c.text.trim().to_lowercase() == wanted)
    else {
        warn!(keyword = %selected.text, "chosen keyword is not in the sheet");
        return;
    };

    if selected.volume == 0 {
        selected.volume = row.volume;
    }
    if selected.difficulty == 0 {
        selected.difficulty = row.difficulty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::Recorder;
    use seoforge_shared::{GenerationError, SearchIntent, Stage};

    fn sheet() -> Vec<KeywordCandidate> {
        vec![
            KeywordCandidate {
                text: "meilleur aspirateur robot".into(),
                volume: 1200,
                difficulty: 35,
                cpc: 0.8,
            },
            KeywordCandidate {
                text: "robot laveur de vitres".into(),
                volume: 300,
                difficulty: 12,
                cpc: 0.4,
            },
        ]
    }

    fn sitemap() -> Vec<String> {
        vec![
            "https://x.fr/".into(),
            "https://x.fr/blog/robot-tondeuse/".into(),
            "https://x.fr/blog/entretien_piscine.html".into(),
        ]
    }

    #[tokio::test]
    async fn selects_and_fills_stats_from_sheet() {
        let model = Arc::new(Recorder::answering(
            r#"```json
{"keyword": "Meilleur aspirateur robot ", "volume": 0, "difficulty": "0",
 "reason": "volume", "search_intent": "Commercial investigation",
 "target_audience": "familles", "semantic_variants": ["robot aspirateur"],
 "angle_editorial": "tests maison"}
```"#,
        ));
        let selector = KeywordSelector::new(model.clone(), "French");

        let kw = selector
            .select(&sheet(), &sitemap(), "Catégorie électroménager")
            .await
            .unwrap();

        assert_eq!(kw.text, "Meilleur aspirateur robot");
        assert_eq!(kw.volume, 1200);
        assert_eq!(kw.difficulty, 35);
        assert_eq!(kw.search_intent, SearchIntent::Commercial);
        assert_eq!(kw.angle, "tests maison");

        let prompt = model.last_prompt();
        assert!(prompt.user.contains("\"keyword\": \"robot laveur de vitres\""));
        assert!(prompt.user.contains("- robot tondeuse"));
        assert!(prompt.user.contains("- entretien piscine"));
        assert!(prompt.user.contains("Catégorie électroménager"));
        assert!(prompt.user.contains("written in French"));
    }

    #[tokio::test]
    async fn keeps_model_stats_and_accepts_unknown_keyword() {
        let model = Arc::new(Recorder::answering(
            r#"{"keyword": "aspirateur robot silencieux", "volume": 90, "difficulty": 8}"#,
        ));
        let kw = KeywordSelector::new(model, "French")
            .select(&sheet(), &[], "")
            .await
            .unwrap();
        assert_eq!(kw.text, "aspirateur robot silencieux");
        assert_eq!(kw.volume, 90);
        assert_eq!(kw.search_intent, SearchIntent::Informational);
    }

    #[tokio::test]
    async fn empty_keyword_is_an_error() {
        let model = Arc::new(Recorder::answering(r#"{"keyword": "   "}"#));
        let err = KeywordSelector::new(model, "French")
            .select(&sheet(), &[], "")
            .await
            .unwrap_err();
        assert!(matches!(err, SeoForgeError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_json_is_an_error() {
        let model = Arc::new(Recorder::answering("I would pick the first one."));
        let err = KeywordSelector::new(model, "French")
            .select(&sheet(), &[], "")
            .await
            .unwrap_err();
        assert!(matches!(err, SeoForgeError::Structured(_)));
        assert_eq!(
            err.at_stage(Stage::KeywordSelection).stage(),
            Some(Stage::KeywordSelection)
        );
    }

    #[tokio::test]
    async fn quota_error_propagates() {
        let model = Arc::new(Recorder::failing(GenerationError::QuotaExhausted {
            model: "gemini-2.5-flash".into(),
            detail: "429".into(),
        }));
        let err = KeywordSelector::new(model, "French")
            .select(&sheet(), &[], "")
            .await
            .unwrap_err();
        assert!(err.is_quota_exhausted());
    }

    #[test]
    fn prompt_caps_candidates_and_topics() {
        let many: Vec<KeywordCandidate> = (0..150)
            .map(|i| KeywordCandidate {
                text: format!("mot cle {i}"),
                volume: i,
                difficulty: 0,
                cpc: 0.0,
            })
            .collect();
        let urls: Vec<String> = (0..90).map(|i| format!("https://x.fr/blog/sujet-{i}")).collect();
        let selector = KeywordSelector::new(Arc::new(Recorder::answering("{}")), "French");

        let prompt = selector.prompt(&many, &urls, "").unwrap();

        assert!(prompt.user.contains("\"mot cle 99\""));
        assert!(!prompt.user.contains("\"mot cle 100\""));
        assert!(prompt.user.contains("- sujet 30\n"));
        assert!(!prompt.user.contains("- sujet 29\n"));
        assert!(!prompt.user.contains("CATEGORY / TARGET PAGE CONTEXT"));
    }
}
