use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use seoforge_llm::{Prompt, TextGenerator};
use seoforge_shared::{EditorialBrief, Result, SectionBudget, SeoForgeError, WordBudget};

use super::ask_structured;

/// Fixed word count for each H2 intro in the fallback allocation.
const FALLBACK_H2_INTRO: u32 = 100;
/// Extra words per sibling index, so subsections never tie.
const SIBLING_STEP: u32 = 5;
/// Minimum FAQ words per question in the fallback allocation.
const FAQ_WORDS_PER_ITEM: u32 = 70;

/// Distributes the target word count across the brief's parts.
pub struct BudgetAllocator {
    generator: Arc<dyn TextGenerator>,
}

impl BudgetAllocator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Ask the model for an allocation; an unusable answer falls back to
    /// [`fallback_budget`].
    #[instrument(skip_all, fields(sections = brief.sections.len(), target_words))]
    pub async fn allocate(&self, brief: &EditorialBrief, target_words: u32) -> Result<WordBudget> {
        let prompt = Prompt::user(prompt_text(brief, target_words)?);

        let mut budget = match ask_structured::<WordBudget>(self.generator.as_ref(), &prompt).await? {
            Ok(budget) => budget,
            Err(e) => {
                warn!(error = %e, "budget response unusable, using equal distribution");
                return Ok(fallback_budget(brief, target_words));
            }
        };

        if budget.total_calculated == 0 {
            budget.total_calculated = target_words;
        }
        debug!(
            allocated = budget.sum(),
            total = budget.total_calculated,
            "word budget allocated"
        );
        Ok(budget)
    }
}

/// Equal-distribution allocation used when the model gives no usable answer.
///
/// Intro 9%, conclusion 6%, FAQ the larger of 70 words per question and 10%;
/// the remainder is split evenly across sections.
pub fn fallback_budget(brief: &EditorialBrief, target_words: u32) -> WordBudget {
    let faq_items = u32::try_from(brief.faq.len()).unwrap_or(u32::MAX);

    let intro = target_words * 9 / 100;
    let conclusion = target_words * 6 / 100;
    let faq = faq_items
        .saturating_mul(FAQ_WORDS_PER_ITEM)
        .max(target_words / 10);
    let body = target_words
        .saturating_sub(intro)
        .saturating_sub(conclusion)
        .saturating_sub(faq);

    let mut budget = WordBudget {
        intro,
        sections: BTreeMap::new(),
        faq,
        conclusion,
        total_calculated: target_words,
    };
    if brief.sections.is_empty() {
        return budget;
    }

    let per_section = body / u32::try_from(brief.sections.len()).unwrap_or(u32::MAX);
    for (i, section) in brief.sections.iter().enumerate() {
        let id = if section.id.is_empty() {
            format!("s{}", i + 1)
        } else {
            section.id.clone()
        };

        let entry = if section.subsections.is_empty() {
            SectionBudget {
                h2_intro: per_section,
                subsections: BTreeMap::new(),
            }
        } else {
            let remaining = per_section.saturating_sub(FALLBACK_H2_INTRO);
            let per_sub = remaining / u32::try_from(section.subsections.len()).unwrap_or(u32::MAX);
            let subsections = section
                .subsections
                .iter()
                .enumerate()
                .map(|(j, sub)| {
                    let sub_id = if sub.id.is_empty() {
                        format!("{id}-{}", j + 1)
                    } else {
                        sub.id.clone()
                    };
                    let step = u32::try_from(j).unwrap_or(u32::MAX).saturating_mul(SIBLING_STEP);
                    (sub_id, per_sub.saturating_add(step))
                })
                .collect();
            SectionBudget {
                h2_intro: FALLBACK_H2_INTRO,
                subsections,
            }
        };
        budget.sections.insert(id, entry);
    }

    budget
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SectionShape<'a> {
    id: &'a str,
    h2: &'a str,
    key_points_count: usize,
    has_media: bool,
    subsections: Vec<SubsectionShape<'a>>,
}

#[derive(Serialize)]
struct SubsectionShape<'a> {
    id: &'a str,
    h3: &'a str,
    key_points_count: usize,
}

fn prompt_text(brief: &EditorialBrief, target_words: u32) -> Result<String> {
    let shape: Vec<SectionShape<'_>> = brief
        .sections
        .iter()
        .map(|s| SectionShape {
            id: &s.id,
            h2: &s.h2,
            key_points_count: s.key_points.len(),
            has_media: !s.media_hint.trim().is_empty(),
            subsections: s
                .subsections
                .iter()
                .map(|sub| SubsectionShape {
                    id: &sub.id,
                    h3: &sub.h3,
                    key_points_count: sub.key_points.len(),
                })
                .collect(),
        })
        .collect();
    let structure = serde_json::to_string_pretty(&shape)
        .map_err(|e| SeoForgeError::parse(format!("failed to serialize brief structure: {e}")))?;

    let faq_count = brief.faq.len();
    Ok(format!(
        r#"You are an expert in SEO article architecture.

ARTICLE STRUCTURE:
{structure}

NUMBER OF FAQ QUESTIONS: {faq_count}
TOTAL TARGET LENGTH: {target_words} words

ALLOCATION RULES:
1. Introduction: 8-10% of the total
2. Conclusion: 5-7% of the total
3. FAQ section: about {faq_min} to {faq_max} words (60-90 words per question and answer)
4. The rest is split across H2 and H3 sections by importance (number of points, media)
5. Each H2 gets an 80-150 word lead-in before its H3s
6. NO two sections may have exactly the same word count (vary by at least 15 words)
7. Minimum: 100 words per H3, 80 words per H2 lead-in
8. All parts together must total {target_words} words (±30 words)

Reply ONLY with a valid JSON object, no text before or after.
Use EXACTLY the ids from the structure above:
{{
  "intro": 220,
  "sections": {{
    "s1": {{"h2_intro": 100, "subsections": {{"s1-1": 250, "s1-2": 230}}}},
    "s2": {{"h2_intro": 120, "subsections": {{}}}}
  }},
  "faq": 320,
  "conclusion": 160,
  "total_calculated": {target_words}
}}"#,
        faq_min = faq_count * 60,
        faq_max = faq_count * 90,
    ))
}
