use std::sync::Arc;

use tracing::{debug, instrument, warn};

use seoforge_llm::{Prompt, TextGenerator};
use seoforge_shared::{InsightReport, Result, SelectedKeyword};

use super::ask_structured;

/// Mines reader questions, subtopics and LSI terms for the chosen keyword.
///
/// An unparsable answer yields an empty [`InsightReport`]; the brief can be
/// built without insights.
pub struct InsightMiner {
    generator: Arc<dyn TextGenerator>,
}

impl InsightMiner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    #[instrument(skip_all, fields(keyword = %keyword.text))]
    pub async fn mine(&self, keyword: &SelectedKeyword) -> Result<InsightReport> {
        let prompt = Prompt::user(prompt_text(keyword));

        match ask_structured::<InsightReport>(self.generator.as_ref(), &prompt).await? {
            Ok(report) => {
                debug!(
                    questions = report.people_also_ask.len(),
                    lsi = report.lsi_keywords.len(),
                    "insights mined"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "insight response unusable, continuing without insights");
                Ok(InsightReport::default())
            }
        }
    }
}

fn prompt_text(keyword: &SelectedKeyword) -> String {
    format!(
        r#"You are an expert in SEO search intent and searcher psychology.

TARGET KEYWORD: "{keyword}"
SEARCH INTENT: {intent}

Produce a complete analysis of what searchers really look for when they type this keyword.

Reply ONLY with a valid JSON object, no text before or after:
{{
  "people_also_ask": [
    "Precise question people ask about this topic?",
    "Question 2?",
    "Question 3?",
    "Question 4?",
    "Question 5?"
  ],
  "related_subtopics": ["Important subtopic 1", "Subtopic 2", "Subtopic 3", "Subtopic 4", "Subtopic 5"],
  "user_problems": ["Concrete problem the reader wants solved", "Problem 2", "Problem 3"],
  "editorial_angles": ["Original angle that stands out from competitors", "Angle 2", "Angle 3"],
  "lsi_keywords": ["related term 1", "lsi 2", "lsi 3", "lsi 4", "lsi 5", "lsi 6", "lsi 7"],
  "content_gaps": ["What competitors probably cover poorly", "Gap 2"]
}}"#,
        keyword = keyword.text,
        intent = keyword.search_intent,
    )
}
