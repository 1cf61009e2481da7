use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, instrument};

use seoforge_llm::{Prompt, TextGenerator};
use seoforge_markdown::{FrontMatter, count_words, split_article_output};
use seoforge_shared::text::slugify;
use seoforge_shared::{
    EditorialBrief, GeneratedArticle, InternalLink, Result, SelectedKeyword, WordBudget,
};

/// Upstream artifacts the writer consumes.
#[derive(Debug, Clone, Copy)]
pub struct WritingInput<'a> {
    pub keyword: &'a SelectedKeyword,
    pub brief: &'a EditorialBrief,
    pub budget: &'a WordBudget,
    pub links: &'a [InternalLink],
}

/// Keyword occurrences to aim for: about 1.5% of the total, at least 4.
pub fn keyword_occurrences(total_words: u32) -> u32 {
    let target = (f64::from(total_words) * 0.015).round() as u32;
    target.max(4)
}

/// Writes the article in both formats and splits the answer.
pub struct ArticleWriter {
    generator: Arc<dyn TextGenerator>,
    language: String,
    max_tokens: u32,
}

impl ArticleWriter {
    pub fn new(generator: Arc<dyn TextGenerator>, language: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            generator,
            language: language.into(),
            max_tokens,
        }
    }

    #[instrument(skip_all, fields(keyword = %input.keyword.text, links = input.links.len()))]
    pub async fn write(&self, input: WritingInput<'_>, now: DateTime<Utc>) -> Result<GeneratedArticle> {
        let slug = slugify(&input.keyword.text);
        let prompt = Prompt::user(self.user_prompt(&input, &slug, now))
            .with_system(self.system_prompt())
            .with_max_tokens(self.max_tokens);

        let raw = self.generator.generate(&prompt).await?;

        let mut tags = vec![input.keyword.text.clone()];
        tags.extend(
            input
                .keyword
                .semantic_variants
                .iter()
                .filter(|v| !v.trim().is_empty())
                .cloned(),
        );
        let front = FrontMatter {
            title: input.brief.h1.clone(),
            date: now.date_naive(),
            description: input.brief.meta_description.clone(),
            tags,
            slug: slug.clone(),
        };
        let parts = split_article_output(&raw, &front)?;

        info!(words = count_words(&parts.markdown), "article written");
        Ok(GeneratedArticle {
            markdown: parts.markdown,
            html: parts.html,
            raw_model_output: raw,
            keyword: input.keyword.text.clone(),
            slug,
            generated_at: now,
        })
    }

    fn system_prompt(&self) -> String {
        format!(
            r#"You are a world-class SEO copywriter writing in {language}. You write blog articles that rank on the first page of Google AND genuinely hold readers.

GOLDEN RULES (non-negotiable)

1. INVERTED PYRAMID
   Every section opens with the most useful information.
   The reader finds the answer in the first two sentences.
   Never open with "In this section, we will...".

2. CREATIVE HEADINGS
   Rewrite EVERY H2/H3 title with original, engaging wording.
   NEVER copy a title from the brief.
   Use numbers, rhetorical questions, contrast, action verbs.

3. SPREAD INTERNAL LINKS
   Place each internal link alone in its paragraph, naturally.
   NEVER two links in the same paragraph or sentence.

4. MEDIA TAGS
   Insert <figure> tags at the media slots planned in the brief:
   <figure>
     <img src="" alt="[precise SEO description of the image]" loading="lazy" width="800" height="500">
     <figcaption>[Useful descriptive caption]</figcaption>
   </figure>
   Leave src="" empty.

5. CURRENT YEAR
   Mention the current year naturally at least once.

6. KEYWORD DENSITY
   Aim for about 1.5%. The keyword must appear in the H1, the first paragraph and at least one H2.
   Use variants and LSI terms to avoid over-optimisation.

7. VOICE AND STYLE
   Short sentences (15 words on average), active voice, concrete examples and figures.
   Address the reader consistently. Avoid filler such as "it is important to note".

8. SEMANTIC HTML
   Use <article>, <section>, <h1>, <h2>, <h3>, <p>, <ul>, <ol>, <li>, <strong>, <em>,
   <blockquote>, <table>, <figure>, <img>, <figcaption>.
   FAQ: use Schema.org FAQPage markup.

9. MARKDOWN FRONT MATTER
   The Markdown article MUST start with a complete YAML front matter.

10. E-E-A-T QUALITY
    Show experience, expertise, authority and trust with verifiable facts and actionable advice.

MANDATORY OUTPUT FORMAT

Produce the article in BOTH formats, separated by these exact markers:

===MARKDOWN===
---
title: "Article title"
date: YYYY-MM-DD
description: "Meta description"
tags: ["tag1", "tag2", "tag3"]
slug: "article-slug"
---

[full Markdown article]
===END MARKDOWN===

===HTML===
<article>
[clean semantic HTML, no DOCTYPE, no <html>, no CSS]
</article>
===END HTML==="#,
            language = self.language,
        )
    }

    fn user_prompt(&self, input: &WritingInput<'_>, slug: &str, now: DateTime<Utc>) -> String {
        let keyword = input.keyword;
        let brief = input.brief;
        let total = if input.budget.total_calculated == 0 {
            input.budget.sum()
        } else {
            input.budget.total_calculated
        };

        format!(
            r#"Write a complete SEO article in {language} about: "{text}"

KEYWORD DATA
Search intent     : {intent}
Target audience   : {audience}
Editorial angle   : {angle}
Semantic variants : {variants}

EDITORIAL BRIEF (structure to follow)
H1: {h1}
Slug: {slug}
Date: {date}
Meta description: {meta}

Intro hook: {hook}
Intro points: {intro_points}

SECTIONS:{sections}
{faq}

Conclusion / CTA: {cta}

WORD BUDGET PER SECTION
{budget}

{links}

CRITICAL REMINDERS
- Every H2/H3 title must be REWRITTEN creatively (not copied from the brief)
- Inverted pyramid in every section
- Keyword "{text}": about {occurrences} occurrences in total
- Year {year} mentioned naturally at least once
- <figure> tags with empty src="" at the indicated slots
- Internal links: at most one per paragraph, never grouped
- Mandatory output format: ===MARKDOWN=== ... ===END MARKDOWN=== then ===HTML=== ... ===END HTML==="#,
            language = self.language,
            text = keyword.text,
            intent = keyword.search_intent,
            audience = keyword.target_audience,
            angle = keyword.angle,
            variants = keyword.semantic_variants.join(", "),
            h1 = brief.h1,
            date = now.format("%Y-%m-%d"),
            meta = brief.meta_description,
            hook = brief.intro_hook,
            intro_points = brief.intro_key_points.join(", "),
            sections = sections_block(brief),
            faq = faq_block(brief),
            cta = brief.conclusion_cta,
            budget = input.budget.to_readable(brief),
            links = links_block(input.links),
            occurrences = keyword_occurrences(total),
            year = now.year(),
        )
    }
}

fn sections_block(brief: &EditorialBrief) -> String {
    let mut lines = Vec::new();
    for section in &brief.sections {
        lines.push(format!("\n[H2] {} ({})", section.h2, section.id));
        lines.push(format!("  LSI to use: {}", section.lsi_terms.join(", ")));
        lines.push("  Points to cover:".to_string());
        lines.extend(section.key_points.iter().map(|p| format!("    - {p}")));
        if !section.media_hint.trim().is_empty() {
            lines.push(format!("  Media to insert: {}", section.media_hint));
        }
        for sub in &section.subsections {
            lines.push(format!("\n  [H3] {} ({})", sub.h3, sub.id));
            lines.extend(sub.key_points.iter().map(|p| format!("    - {p}")));
        }
    }
    lines.join("\n")
}

fn faq_block(brief: &EditorialBrief) -> String {
    if brief.faq.is_empty() {
        return String::new();
    }
    let mut lines = vec!["\n[FAQ, use Schema.org FAQPage markup]".to_string()];
    for item in &brief.faq {
        lines.push(format!("  Q: {}", item.question));
        lines.push(format!("     Answer must cover: {}", item.answer_hint));
    }
    lines.join("\n")
}

fn links_block(links: &[InternalLink]) -> String {
    if links.is_empty() {
        return "No internal links for this article.".to_string();
    }
    let mut lines =
        vec!["INTERNAL LINKS TO PLACE (one link per paragraph, never grouped):".to_string()];
    for link in links {
        lines.push(format!(
            "  - Anchor: \"{}\" -> {}\n    Target section: {}\n    How to integrate: {}",
            link.anchor_text, link.url, link.target_section_id, link.integration_hint
        ));
    }
    lines.join("\n")
}
