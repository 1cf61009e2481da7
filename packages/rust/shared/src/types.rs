//! Core domain types for SeoForge runs.
//!
//! Every stage produces exactly one of these and downstream stages only read
//! it. Model-facing types deserialize leniently: numbers may arrive as
//! strings or floats, and optional fields default to empty.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

/// One row of the keyword sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCandidate {
    #[serde(rename = "keyword")]
    pub text: String,
    #[serde(default)]
    pub volume: u64,
    #[serde(default)]
    pub difficulty: u32,
    #[serde(default)]
    pub cpc: f64,
}

/// Search intent behind a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SearchIntent {
    #[default]
    Informational,
    Commercial,
    Transactional,
    Navigational,
}

impl From<String> for SearchIntent {
    fn from(raw: String) -> Self {
        let lower = raw.to_lowercase();
        if lower.starts_with("commerc") {
            Self::Commercial
        } else if lower.starts_with("transac") {
            Self::Transactional
        } else if lower.starts_with("naviga") {
            Self::Navigational
        } else {
            Self::Informational
        }
    }
}

impl std::fmt::Display for SearchIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Informational => "informational",
            Self::Commercial => "commercial",
            Self::Transactional => "transactional",
            Self::Navigational => "navigational",
        };
        f.write_str(s)
    }
}

/// The keyword chosen for this run, with the model's reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedKeyword {
    #[serde(alias = "keyword")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub volume: u64,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub difficulty: u32,
    #[serde(default, deserialize_with = "string_or_null")]
    pub reason: String,
    #[serde(default, deserialize_with = "intent_or_null")]
    pub search_intent: SearchIntent,
    #[serde(default, deserialize_with = "string_or_null")]
    pub target_audience: String,
    #[serde(default, deserialize_with = "list_or_null")]
    pub semantic_variants: Vec<String>,
    #[serde(default, alias = "angle_editorial", deserialize_with = "string_or_null")]
    pub angle: String,
}

// ---------------------------------------------------------------------------
// Competitors and insights
// ---------------------------------------------------------------------------

/// One competitor page, in search rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorRecord {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub body_excerpt: String,
}

/// Search-intent research for the chosen keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightReport {
    #[serde(deserialize_with = "list_or_null")]
    pub people_also_ask: Vec<String>,
    #[serde(deserialize_with = "list_or_null")]
    pub related_subtopics: Vec<String>,
    #[serde(deserialize_with = "list_or_null")]
    pub user_problems: Vec<String>,
    #[serde(deserialize_with = "list_or_null")]
    pub editorial_angles: Vec<String>,
    #[serde(deserialize_with = "list_or_null")]
    pub lsi_keywords: Vec<String>,
    #[serde(deserialize_with = "list_or_null")]
    pub content_gaps: Vec<String>,
}

impl InsightReport {
    /// True when every list is empty.
    pub fn is_empty(&self) -> bool {
        self.people_also_ask.is_empty()
            && self.related_subtopics.is_empty()
            && self.user_problems.is_empty()
            && self.editorial_angles.is_empty()
            && self.lsi_keywords.is_empty()
            && self.content_gaps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EditorialBrief
// ---------------------------------------------------------------------------

/// The structured outline every later stage conforms to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorialBrief {
    pub h1: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub meta_description: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub intro_hook: String,
    #[serde(default, deserialize_with = "list_or_null")]
    pub intro_key_points: Vec<String>,
    #[serde(default, deserialize_with = "list_or_null")]
    pub sections: Vec<Section>,
    #[serde(default, deserialize_with = "list_or_null")]
    pub faq: Vec<FaqItem>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub conclusion_cta: String,
}

/// An H2 block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "string_or_null")]
    pub id: String,
    pub h2: String,
    #[serde(default, alias = "lsi_to_use", deserialize_with = "list_or_null")]
    pub lsi_terms: Vec<String>,
    #[serde(default, deserialize_with = "list_or_null")]
    pub key_points: Vec<String>,
    #[serde(default, alias = "media_suggestion", deserialize_with = "string_or_null")]
    pub media_hint: String,
    #[serde(default, deserialize_with = "list_or_null")]
    pub subsections: Vec<Subsection>,
}

/// An H3 block inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    #[serde(default, deserialize_with = "string_or_null")]
    pub id: String,
    pub h3: String,
    #[serde(default, deserialize_with = "list_or_null")]
    pub key_points: Vec<String>,
}

/// One FAQ entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub answer_hint: String,
}

impl EditorialBrief {
    /// Make every section and subsection id non-empty and unique.
    ///
    /// Offending ids are replaced with `s{n}` / `s{n}-{m}` (1-based), suffixed
    /// if that name is already taken. Returns how many ids were rewritten.
    pub fn ensure_unique_ids(&mut self) -> usize {
        let mut seen: HashSet<String> = HashSet::new();
        let mut rewritten = 0;

        for (i, section) in self.sections.iter_mut().enumerate() {
            let base = format!("s{}", i + 1);
            if section.id.trim().is_empty() || seen.contains(section.id.trim()) {
                section.id = fresh_id(&base, &seen);
                rewritten += 1;
            } else {
                section.id = section.id.trim().to_string();
            }
            seen.insert(section.id.clone());

            for (j, sub) in section.subsections.iter_mut().enumerate() {
                let base = format!("s{}-{}", i + 1, j + 1);
                if sub.id.trim().is_empty() || seen.contains(sub.id.trim()) {
                    sub.id = fresh_id(&base, &seen);
                    rewritten += 1;
                } else {
                    sub.id = sub.id.trim().to_string();
                }
                seen.insert(sub.id.clone());
            }
        }

        rewritten
    }

    /// Look up a section by id.
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }
}

fn fresh_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

// ---------------------------------------------------------------------------
// WordBudget
// ---------------------------------------------------------------------------

/// Per-section word allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBudget {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub intro: u32,
    #[serde(default)]
    pub sections: BTreeMap<String, SectionBudget>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub faq: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub conclusion: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub total_calculated: u32,
}

/// Allocation for one H2 block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBudget {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub h2_intro: u32,
    #[serde(default, deserialize_with = "lenient_word_map")]
    pub subsections: BTreeMap<String, u32>,
}

const READABLE_INTRO: u32 = 200;
const READABLE_H2_INTRO: u32 = 100;
const READABLE_H3: u32 = 200;
const READABLE_FAQ: u32 = 300;
const READABLE_CONCLUSION: u32 = 150;

impl WordBudget {
    /// Sum of every allocated part, saturating at `u32::MAX`.
    pub fn sum(&self) -> u32 {
        self.sections
            .values()
            .flat_map(|s| std::iter::once(s.h2_intro).chain(s.subsections.values().copied()))
            .chain([self.intro, self.faq, self.conclusion])
            .fold(0u32, u32::saturating_add)
    }

    /// Render the allocation in brief order for the writing prompt.
    ///
    /// Parts the budget does not mention fall back to fixed defaults.
    pub fn to_readable(&self, brief: &EditorialBrief) -> String {
        let or = |value: u32, fallback: u32| if value == 0 { fallback } else { value };

        let mut lines = vec![format!(
            "- Introduction: {} words",
            or(self.intro, READABLE_INTRO)
        )];

        for section in &brief.sections {
            let budget = self.sections.get(&section.id);
            let h2_intro = budget.map_or(0, |b| b.h2_intro);
            lines.push(format!(
                "- H2 \"{}\" ({}): intro {} words",
                section.h2,
                section.id,
                or(h2_intro, READABLE_H2_INTRO)
            ));
            for sub in &section.subsections {
                let words = budget
                    .and_then(|b| b.subsections.get(&sub.id))
                    .copied()
                    .unwrap_or(0);
                lines.push(format!(
                    "  - H3 \"{}\" ({}): {} words",
                    sub.h3,
                    sub.id,
                    or(words, READABLE_H3)
                ));
            }
        }

        lines.push(format!(
            "- FAQ ({} questions): {} words",
            brief.faq.len(),
            or(self.faq, READABLE_FAQ)
        ));
        lines.push(format!(
            "- Conclusion: {} words",
            or(self.conclusion, READABLE_CONCLUSION)
        ));
        lines.push(format!("- Total: {} words", self.total_calculated));
        lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Internal links
// ---------------------------------------------------------------------------

/// A model-proposed link. Untrusted until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalLinkCandidate {
    #[serde(deserialize_with = "string_or_null")]
    pub url: String,
    #[serde(deserialize_with = "string_or_null")]
    pub anchor_text: String,
    #[serde(deserialize_with = "string_or_null")]
    pub target_section_id: String,
    #[serde(deserialize_with = "string_or_null")]
    pub integration_hint: String,
}

/// A link whose URL is a member of the trusted sitemap set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalLink {
    pub url: String,
    pub anchor_text: String,
    pub target_section_id: String,
    pub integration_hint: String,
}

impl InternalLink {
    /// Accept a candidate, replacing its URL with the trusted form.
    pub fn accept(candidate: &InternalLinkCandidate, trusted_url: &str) -> Self {
        Self {
            url: trusted_url.to_string(),
            anchor_text: candidate.anchor_text.clone(),
            target_section_id: candidate.target_section_id.clone(),
            integration_hint: candidate.integration_hint.clone(),
        }
    }
}

impl From<InternalLink> for InternalLinkCandidate {
    fn from(link: InternalLink) -> Self {
        Self {
            url: link.url,
            anchor_text: link.anchor_text,
            target_section_id: link.target_section_id,
            integration_hint: link.integration_hint,
        }
    }
}

// ---------------------------------------------------------------------------
// GeneratedArticle
// ---------------------------------------------------------------------------

/// The terminal artifact of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub markdown: String,
    pub html: String,
    pub raw_model_output: String,
    pub keyword: String,
    pub slug: String,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Lenient number parsing
// ---------------------------------------------------------------------------

fn value_to_u64(value: &serde_json::Value) -> u64 {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f.round() as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            cleaned.parse::<f64>().map(|f| f.round() as u64).unwrap_or(0)
        }
        _ => 0,
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_u64(&value))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(u32::try_from(value_to_u64(&value)).unwrap_or(u32::MAX))
}

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn list_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn intent_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SearchIntent, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(SearchIntent::from)
        .unwrap_or_default())
}

fn lenient_word_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, u32>, D::Error> {
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, u32::try_from(value_to_u64(&v)).unwrap_or(u32::MAX)))
        .collect())
}
