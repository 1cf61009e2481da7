use std::sync::Arc;

use tracing::{info, instrument, warn};

use seoforge_llm::{Prompt, TextGenerator};
use seoforge_shared::text::truncate_chars;
use seoforge_shared::{EditorialBrief, InsightReport, Result, SelectedKeyword, SeoForgeError};

use super::{ask_structured, bullets};

/// Competitor summary characters included in the prompt.
const SUMMARY_CHARS: usize = 3000;

/// Builds the editorial brief: H1, meta, H2/H3 outline, FAQ.
pub struct BriefBuilder {
    generator: Arc<dyn TextGenerator>,
}

impl BriefBuilder {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Every later stage addresses sections by id, so ids are made unique
    /// before the brief is returned.
    #[instrument(skip_all, fields(keyword = %keyword.text, target_words))]
    pub async fn build(
        &self,
        keyword: &SelectedKeyword,
        competitor_summary: &str,
        insights: &InsightReport,
        target_words: u32,
    ) -> Result<EditorialBrief> {
        let prompt = Prompt::user(prompt_text(
            keyword,
            competitor_summary,
            insights,
            target_words,
        ));

        let mut brief: EditorialBrief = ask_structured(self.generator.as_ref(), &prompt).await??;

        if brief.sections.is_empty() {
            return Err(SeoForgeError::validation("the brief has no sections"));
        }
        if brief.h1.trim().is_empty() {
            brief.h1 = keyword.text.clone();
        }
        let rewritten = brief.ensure_unique_ids();
        if rewritten > 0 {
            warn!(rewritten, "reassigned missing or duplicate section ids");
        }

        info!(
            sections = brief.sections.len(),
            faq = brief.faq.len(),
            "brief built"
        );
        Ok(brief)
    }
}

fn prompt_text(
    keyword: &SelectedKeyword,
    competitor_summary: &str,
    insights: &InsightReport,
    target_words: u32,
) -> String {
    let competitors = if competitor_summary.trim().is_empty() {
        "Not available"
    } else {
        truncate_chars(competitor_summary, SUMMARY_CHARS)
    };

    format!(
        r#"You are an expert SEO architect. Build a detailed, actionable editorial brief for an SEO-optimised blog article.

MAIN KEYWORD: {keyword}
SEARCH INTENT: {intent}
TARGET AUDIENCE: {audience}
EDITORIAL ANGLE: {angle}
TARGET LENGTH: {target_words} words
SEMANTIC VARIANTS: {variants}

COMPETITOR ANALYSIS (top search results):
{competitors}

SEARCHER QUESTIONS (People Also Ask):
{paa}

IMPORTANT SUBTOPICS:
{subtopics}

USER PROBLEMS TO SOLVE:
{problems}

LSI KEYWORDS TO WORK IN NATURALLY:
{lsi}

COMPETITOR GAPS (opportunities):
{gaps}

BRIEF INSTRUCTIONS:
- H1: contains the main keyword, natural and compelling
- Meta description: 150-160 characters, keyword included, invites the click
- H2: 4 to 6 main sections, use semantic variants rather than repeating the exact keyword
- H3: at most 2-3 subsections per H2, precise and actionable
- Plan 2-3 image/media slots with a description
- Mandatory FAQ with 4-5 searcher questions
- Intro: strong hook and inverted pyramid (answer first, expand after)
- The article must cover the full intent and stand out from competitors

Reply ONLY with a valid JSON object, no text before or after:
{{
  "h1": "Full, compelling H1 containing the keyword",
  "meta_description": "150-160 character meta description with the keyword",
  "intro_hook": "Highly engaging opening sentence",
  "intro_key_points": ["Key point for the intro 1", "Point 2", "Point 3"],
  "sections": [
    {{
      "id": "s1",
      "h2": "Original H2 title (semantic variant)",
      "lsi_to_use": ["lsi keyword to place in this section"],
      "key_points": ["Key point 1", "Key point 2", "Key point 3"],
      "media_suggestion": "Description of the ideal image or diagram here (or null)",
      "subsections": [
        {{"id": "s1-1", "h3": "Precise H3 title", "key_points": ["Point 1", "Point 2"]}},
        {{"id": "s1-2", "h3": "Next H3 title", "key_points": ["Point 1", "Point 2"]}}
      ]
    }},
    {{
      "id": "s2",
      "h2": "Second H2 section",
      "lsi_to_use": ["another lsi"],
      "key_points": ["Key point 1", "Key point 2"],
      "media_suggestion": null,
      "subsections": []
    }}
  ],
  "faq": [
    {{"question": "Exact FAQ question (from People Also Ask)?", "answer_hint": "What the answer must cover"}},
    {{"question": "Second FAQ question?", "answer_hint": "Points to cover"}}
  ],
  "conclusion_cta": "Conclusion idea: what it sums up and the proposed call to action"
}}"#,
        keyword = keyword.text,
        intent = keyword.search_intent,
        audience = keyword.target_audience,
        angle = keyword.angle,
        variants = keyword.semantic_variants.join(", "),
        paa = bullets(&insights.people_also_ask),
        subtopics = bullets(&insights.related_subtopics),
        problems = bullets(&insights.user_problems),
        lsi = insights.lsi_keywords.join(", "),
        gaps = bullets(&insights.content_gaps),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::Recorder;

    fn keyword() -> SelectedKeyword {
        serde_json::from_str(
            r#"{"keyword": "meilleur aspirateur robot", "target_audience": "familles",
                "semantic_variants": ["robot aspirateur", "aspirateur autonome"]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn builds_brief_and_fixes_ids() {
        let model = Arc::new(Recorder::answering(
            r#"{"h1": "Meilleur aspirateur robot : le comparatif",
                "meta_description": "Notre sélection.",
                "sections": [
                  {"id": "s1", "h2": "Comment choisir", "lsi_to_use": ["autonomie"],
                   "media_suggestion": null,
                   "subsections": [{"id": "s1-1", "h3": "Autonomie"}, {"id": "s1-1", "h3": "Bruit"}]},
                  {"h2": "Notre top 5"}
                ],
                "faq": [{"question": "Quel budget ?"}]}"#,
        ));
        let insights = InsightReport {
            people_also_ask: vec!["Quel robot pour les poils ?".into()],
            lsi_keywords: vec!["station de vidage".into(), "cartographie".into()],
            ..InsightReport::default()
        };

        let brief = BriefBuilder::new(model.clone())
            .build(&keyword(), "### Competitor 1: Test", &insights, 2000)
            .await
            .unwrap();

        assert_eq!(brief.sections.len(), 2);
        assert_eq!(brief.sections[0].lsi_terms, vec!["autonomie"]);
        assert_eq!(brief.sections[0].media_hint, "");
        assert_eq!(brief.sections[0].subsections[1].id, "s1-2");
        assert_eq!(brief.sections[1].id, "s2");
        assert_eq!(brief.faq[0].answer_hint, "");

        let prompt = model.last_prompt();
        assert!(prompt.user.contains("TARGET LENGTH: 2000 words"));
        assert!(prompt.user.contains("### Competitor 1: Test"));
        assert!(prompt.user.contains("- Quel robot pour les poils ?"));
        assert!(prompt.user.contains("station de vidage, cartographie"));
        assert!(prompt.user.contains("USER PROBLEMS TO SOLVE:\n- (none)"));
    }

    #[tokio::test]
    async fn blank_h1_falls_back_to_keyword() {
        let model = Arc::new(Recorder::answering(
            r#"{"h1": " ", "sections": [{"id": "a", "h2": "Intro"}]}"#,
        ));
        let brief = BriefBuilder::new(model)
            .build(&keyword(), "", &InsightReport::default(), 1200)
            .await
            .unwrap();
        assert_eq!(brief.h1, "meilleur aspirateur robot");
    }

    #[tokio::test]
    async fn no_sections_is_an_error() {
        let model = Arc::new(Recorder::answering(r#"{"h1": "Titre", "sections": []}"#));
        let err = BriefBuilder::new(model)
            .build(&keyword(), "", &InsightReport::default(), 1200)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no sections"));
    }

    #[tokio::test]
    async fn unparsable_brief_is_an_error() {
        let model = Arc::new(Recorder::answering(r#"{"h1": "Titre", "sections": [{"#));
        let err = BriefBuilder::new(model)
            .build(&keyword(), "", &InsightReport::default(), 1200)
            .await
            .unwrap_err();
        assert!(matches!(err, SeoForgeError::Structured(_)));
    }

    #[test]
    fn long_summary_is_truncated() {
        let summary = "x".repeat(5000);
        let text = prompt_text(&keyword(), &summary, &InsightReport::default(), 1500);
        assert!(text.contains(&"x".repeat(3000)));
        assert!(!text.contains(&"x".repeat(3001)));
    }

    #[test]
    fn empty_summary_is_marked_unavailable() {
        let text = prompt_text(&keyword(), "  ", &InsightReport::default(), 1500);
        assert!(text.contains("COMPETITOR ANALYSIS (top search results):\nNot available"));
    }
}
