//! Competitor intelligence with ordered fallback.
//!
//! Scraping strategies are tried in order, each only when every earlier one
//! came back empty. When none yields a record, the analysis model is asked
//! to synthesize a plausible competitive landscape instead. The cascade never
//! fails: having no competitor data is a normal outcome.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use seoforge_crawler::CompetitorSource;
use seoforge_llm::{Prompt, TextGenerator};
use seoforge_shared::text::truncate_chars;
use seoforge_shared::{CompetitorRecord, GenerationError, parse_structured};

/// Summary used when there is nothing to summarize.
pub const NO_COMPETITOR_DATA: &str = "No competitor data available.";

/// Header of a model-synthesized summary.
pub const SYNTHESIS_HEADER: &str = "[AI-generated competitor analysis: web scraping was blocked]";

/// Characters of page text kept per competitor in the summary.
const SUMMARY_BODY_CHARS: usize = 1200;

// ---------------------------------------------------------------------------
// Acquisition result
// ---------------------------------------------------------------------------

/// Which strategy produced the competitor data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Records scraped by the named source.
    Scraped { source: String },
    /// No records; the text is a model-written landscape.
    Synthesized(String),
    /// Every strategy failed.
    Unavailable,
    /// Competitor analysis was turned off (desired count 0).
    Disabled,
}

impl Provenance {
    /// Short label for logs and progress output.
    pub fn label(&self) -> &str {
        match self {
            Self::Scraped { source } => source,
            Self::Synthesized(_) => "ai-synthesis",
            Self::Unavailable => "unavailable",
            Self::Disabled => "disabled",
        }
    }
}

/// Records plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    pub records: Vec<CompetitorRecord>,
    pub provenance: Provenance,
}

impl Acquisition {
    fn empty(provenance: Provenance) -> Self {
        Self {
            records: Vec::new(),
            provenance,
        }
    }

    /// The competitor summary handed to the brief stage.
    ///
    /// Scraped records are formatted; synthesized text is used verbatim.
    pub fn summary(&self) -> String {
        if !self.records.is_empty() {
            return format_competitor_summary(&self.records);
        }
        match &self.provenance {
            Provenance::Synthesized(text) if !text.trim().is_empty() => text.clone(),
            _ => NO_COMPETITOR_DATA.to_string(),
        }
    }
}

/// Deterministic text rendering of scraped records, in rank order.
pub fn format_competitor_summary(records: &[CompetitorRecord]) -> String {
    if records.is_empty() {
        return NO_COMPETITOR_DATA.to_string();
    }

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let title = if record.title.is_empty() { "-" } else { &record.title };
            let mut block = format!("### Competitor {}: {title}\nURL: {}\n", i + 1, record.url);
            if !record.snippet.is_empty() {
                block.push_str(&format!("SERP snippet: {}\n", record.snippet));
            }
            if !record.body_excerpt.is_empty() {
                block.push_str(&format!(
                    "Page content (excerpt):\n{}\n",
                    truncate_chars(&record.body_excerpt, SUMMARY_BODY_CHARS)
                ));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

/// Ordered fallback over scraping strategies and model synthesis.
pub struct SourceAcquisitionCascade {
    sources: Vec<Arc<dyn CompetitorSource>>,
    synthesizer: Option<Arc<dyn TextGenerator>>,
}

impl SourceAcquisitionCascade {
    /// Strategies are tried in the given order.
    pub fn new(sources: Vec<Arc<dyn CompetitorSource>>) -> Self {
        Self {
            sources,
            synthesizer: None,
        }
    }

    /// Use `generator` as the last-resort strategy.
    pub fn with_synthesizer(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.synthesizer = Some(generator);
        self
    }

    /// Get up to `desired_count` competitor records for `keyword`.
    ///
    /// A count of 0 returns immediately without touching any source.
    #[instrument(skip_all, fields(keyword = %keyword, desired_count = desired_count))]
    pub async fn acquire(&self, keyword: &str, desired_count: usize) -> Acquisition {
        if desired_count == 0 {
            debug!("competitor analysis disabled");
            return Acquisition::empty(Provenance::Disabled);
        }

        for source in &self.sources {
            match source.search(keyword, desired_count).await {
                Ok(records) if !records.is_empty() => {
                    info!(source = source.name(), count = records.len(), "competitors acquired");
                    return Acquisition {
                        records,
                        provenance: Provenance::Scraped {
                            source: source.name().to_string(),
                        },
                    };
                }
                Ok(_) => info!(source = source.name(), "no usable results, trying next strategy"),
                Err(e) => warn!(source = source.name(), error = %e, "strategy failed, trying next"),
            }
        }

        let Some(generator) = &self.synthesizer else {
            warn!("every scraping strategy failed and no synthesizer is configured");
            return Acquisition::empty(Provenance::Unavailable);
        };

        match synthesize(generator.as_ref(), keyword, desired_count).await {
            Some(text) => {
                info!("competitor landscape synthesized by the model");
                Acquisition::empty(Provenance::Synthesized(text))
            }
            None => Acquisition::empty(Provenance::Unavailable),
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Landscape {
    competitors: Vec<SynthesizedCompetitor>,
    overall_gaps: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SynthesizedCompetitor {
    title: String,
    domain: String,
    main_angles: Vec<String>,
    content_structure: Vec<String>,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
}

fn synthesis_prompt(keyword: &str, count: usize) -> Prompt {
    Prompt::user(format!(
        r#"You are an SEO expert. Describe the competitive landscape of the {count} articles that typically rank on the first page of Google for: "{keyword}"

Based on your knowledge of the topic, produce a realistic and useful competitor analysis.
Reply ONLY with valid JSON:
{{
  "competitors": [
    {{
      "title": "Realistic title of a competing article",
      "domain": "typical-domain.com",
      "main_angles": ["Main angle 1", "Angle 2", "Angle 3"],
      "content_structure": ["Typical H2 1", "Typical H2 2", "Typical H2 3"],
      "strengths": ["Strength 1", "Strength 2"],
      "weaknesses": ["Exploitable gap 1", "Gap 2"]
    }}
  ],
  "overall_gaps": ["Content opportunity 1", "Opportunity 2", "Opportunity 3"]
}}"#
    ))
}

/// Ask the model for a landscape; `None` when it fails or says nothing.
async fn synthesize(generator: &dyn TextGenerator, keyword: &str, count: usize) -> Option<String> {
    let raw = match generator.generate(&synthesis_prompt(keyword, count)).await {
        Ok(raw) => raw,
        Err(e @ GenerationError::QuotaExhausted { .. }) => {
            error!(
                error = %e,
                "generator quota exhausted during competitor synthesis; check billing or wait for the quota to reset"
            );
            return None;
        }
        Err(e) => {
            warn!(error = %e, "competitor synthesis failed");
            return None;
        }
    };

    let landscape: Landscape = match parse_structured(&raw) {
        Ok(landscape) => landscape,
        Err(e) => {
            warn!(error = %e, "competitor synthesis returned no usable JSON");
            return None;
        }
    };

    if landscape.competitors.is_empty() && landscape.overall_gaps.is_empty() {
        warn!("competitor synthesis was empty");
        return None;
    }
    Some(format_landscape(&landscape))
}

fn format_landscape(landscape: &Landscape) -> String {
    let mut lines = vec![SYNTHESIS_HEADER.to_string(), String::new()];

    for (i, c) in landscape.competitors.iter().enumerate() {
        lines.push(format!("### Competitor {} (AI): {}", i + 1, c.title));
        lines.push(format!("Domain: {}", c.domain));
        if !c.main_angles.is_empty() {
            lines.push(format!("Angles: {}", c.main_angles.join(", ")));
        }
        if !c.content_structure.is_empty() {
            lines.push(format!("Structure: {}", c.content_structure.join(" → ")));
        }
        if !c.strengths.is_empty() {
            lines.push(format!("Strengths: {}", c.strengths.join(", ")));
        }
        if !c.weaknesses.is_empty() {
            lines.push(format!("Gaps to exploit: {}", c.weaknesses.join(", ")));
        }
        lines.push(String::new());
    }

    if !landscape.overall_gaps.is_empty() {
        lines.push("### Overall opportunities:".to_string());
        lines.extend(landscape.overall_gaps.iter().map(|g| format!("  - {g}")));
    }

    lines.join("\n").trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
