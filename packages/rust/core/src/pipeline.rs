//! End-to-end `generate` pipeline: keyword → competitors → insights → brief →
//! links → budget → article → files.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use seoforge_crawler::PageFetcher;
use seoforge_discovery::{SitemapSource, parse_keyword_csv};
use seoforge_llm::TextGenerator;
use seoforge_shared::{
    EditorialBrief, GenerateSettings, GeneratedArticle, InsightReport, KeywordCandidate, Result,
    RunId, SelectedKeyword, SeoForgeError, Stage, WordBudget,
};

use crate::cascade::{Acquisition, SourceAcquisitionCascade};
use crate::links::{LinkValidation, propose_internal_links};
use crate::output::{RunHistory, RunRecord, write_article};
use crate::stages::{
    ArticleWriter, BriefBuilder, BudgetAllocator, InsightMiner, KeywordSelector, WritingInput,
};

/// Characters read from the optional category page.
const CATEGORY_CHARS: usize = 3000;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// A stage is starting.
    fn stage_started(&self, stage: Stage);
    /// A stage completed; `detail` is a short human summary.
    fn stage_finished(&self, stage: Stage, detail: &str);
    /// Free-form status outside the stage sequence.
    fn note(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _detail: &str) {}
    fn note(&self, _message: &str) {}
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything a run reads before the first model call.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub keywords: Vec<KeywordCandidate>,
    pub sitemap_urls: Vec<String>,
    pub category_context: String,
}

impl RunInputs {
    /// Parse the keyword sheet and read the site's sitemap and category page.
    ///
    /// Only an unreadable keyword sheet is an error; an unreachable sitemap
    /// or category page leaves the corresponding input empty.
    #[instrument(skip_all, fields(sitemap = %sitemap_root, category = category_url.unwrap_or("")))]
    pub async fn gather(
        keyword_csv: &[u8],
        sitemap: &dyn SitemapSource,
        sitemap_root: &str,
        fetcher: &dyn PageFetcher,
        category_url: Option<&str>,
    ) -> Result<Self> {
        let keywords = parse_keyword_csv(keyword_csv)?;

        let sitemap_urls = match sitemap.list_urls(sitemap_root).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(error = %e, "sitemap unavailable, continuing without site URLs");
                Vec::new()
            }
        };

        let category_context = match category_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => fetcher.fetch_text(url, CATEGORY_CHARS).await,
            None => String::new(),
        };

        info!(
            keywords = keywords.len(),
            sitemap_urls = sitemap_urls.len(),
            category_chars = category_context.chars().count(),
            "inputs gathered"
        );
        Ok(Self {
            keywords,
            sitemap_urls,
            category_context,
        })
    }
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// Artifacts produced so far. Each field is filled once, in stage order.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub keyword: Option<SelectedKeyword>,
    pub acquisition: Option<Acquisition>,
    pub competitor_summary: Option<String>,
    pub insights: Option<InsightReport>,
    pub brief: Option<EditorialBrief>,
    pub links: Option<LinkValidation>,
    pub budget: Option<WordBudget>,
    pub article: Option<GeneratedArticle>,
    pub record: Option<RunRecord>,
}

impl RunContext {
    fn new() -> Self {
        Self {
            run_id: RunId::new(),
            keyword: None,
            acquisition: None,
            competitor_summary: None,
            insights: None,
            brief: None,
            links: None,
            budget: None,
            article: None,
            record: None,
        }
    }
}

/// A run that stopped at a stage boundary, with what it had produced.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    pub context: Box<RunContext>,
    pub error: SeoForgeError,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Runs the stages in order and keeps the history of completed runs.
pub struct PipelineDriver {
    settings: GenerateSettings,
    analysis: Arc<dyn TextGenerator>,
    cascade: SourceAcquisitionCascade,
    selector: KeywordSelector,
    miner: InsightMiner,
    briefs: BriefBuilder,
    allocator: BudgetAllocator,
    writer: ArticleWriter,
    history: RunHistory,
}

impl PipelineDriver {
    /// `analysis` serves every structured stage; `writing` only the article.
    pub fn new(
        settings: GenerateSettings,
        analysis: Arc<dyn TextGenerator>,
        writing: Arc<dyn TextGenerator>,
        cascade: SourceAcquisitionCascade,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            selector: KeywordSelector::new(analysis.clone(), settings.language.clone()),
            miner: InsightMiner::new(analysis.clone()),
            briefs: BriefBuilder::new(analysis.clone()),
            allocator: BudgetAllocator::new(analysis.clone()),
            writer: ArticleWriter::new(writing, settings.language.clone(), settings.writing_max_tokens),
            analysis,
            cascade,
            settings,
            history: RunHistory::default(),
        })
    }

    pub fn settings(&self) -> &GenerateSettings {
        &self.settings
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    /// Run every stage. On failure the partial context travels with the error
    /// and no file is written.
    pub async fn run(
        &mut self,
        inputs: &RunInputs,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<RunContext, RunFailure> {
        let start = Instant::now();
        let mut ctx = RunContext::new();

        match self.execute(inputs, &mut ctx, progress).await {
            Ok(record) => {
                info!(
                    run_id = %ctx.run_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "run complete"
                );
                self.history.push(record);
                Ok(ctx)
            }
            Err(error) => {
                warn!(run_id = %ctx.run_id, stage = ?error.stage(), error = %error, "run stopped");
                Err(RunFailure {
                    context: Box::new(ctx),
                    error,
                })
            }
        }
    }

    #[instrument(skip_all, fields(run_id = %ctx.run_id, target_words = self.settings.target_words))]
    async fn execute(
        &self,
        inputs: &RunInputs,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<RunRecord> {
        let target_words = self.settings.target_words;

        // Keyword
        progress.stage_started(Stage::KeywordSelection);
        let keyword = self
            .selector
            .select(&inputs.keywords, &inputs.sitemap_urls, &inputs.category_context)
            .await
            .map_err(|e| e.at_stage(Stage::KeywordSelection))?;
        progress.stage_finished(Stage::KeywordSelection, &keyword.text);
        ctx.keyword = Some(keyword.clone());

        // Competitors
        progress.stage_started(Stage::CompetitorAnalysis);
        let acquisition = self
            .cascade
            .acquire(&keyword.text, self.settings.competitors)
            .await;
        let summary = acquisition.summary();
        progress.stage_finished(
            Stage::CompetitorAnalysis,
            &format!(
                "{} ({} records)",
                acquisition.provenance.label(),
                acquisition.records.len()
            ),
        );
        ctx.acquisition = Some(acquisition);
        ctx.competitor_summary = Some(summary.clone());

        // Insights
        progress.stage_started(Stage::Insights);
        let insights = self
            .miner
            .mine(&keyword)
            .await
            .map_err(|e| e.at_stage(Stage::Insights))?;
        progress.stage_finished(
            Stage::Insights,
            &format!("{} questions", insights.people_also_ask.len()),
        );
        ctx.insights = Some(insights.clone());

        // Brief
        progress.stage_started(Stage::Brief);
        let brief = self
            .briefs
            .build(&keyword, &summary, &insights, target_words)
            .await
            .map_err(|e| e.at_stage(Stage::Brief))?;
        progress.stage_finished(Stage::Brief, &format!("{} sections", brief.sections.len()));
        ctx.brief = Some(brief.clone());

        // Internal links
        progress.stage_started(Stage::InternalLinks);
        let links = propose_internal_links(
            self.analysis.as_ref(),
            &brief,
            &keyword.text,
            &inputs.sitemap_urls,
        )
        .await
        .map_err(|e| e.at_stage(Stage::InternalLinks))?;
        progress.stage_finished(
            Stage::InternalLinks,
            &format!("{} accepted, {} rejected", links.links.len(), links.rejected.len()),
        );
        ctx.links = Some(links.clone());

        // Budget
        progress.stage_started(Stage::WordBudget);
        let budget = self
            .allocator
            .allocate(&brief, target_words)
            .await
            .map_err(|e| e.at_stage(Stage::WordBudget))?;
        progress.stage_finished(Stage::WordBudget, &format!("{} words", budget.sum()));
        ctx.budget = Some(budget.clone());

        // Writing
        progress.stage_started(Stage::Writing);
        let input = WritingInput {
            keyword: &keyword,
            brief: &brief,
            budget: &budget,
            links: &links.links,
        };
        let article = self
            .writer
            .write(input, Utc::now())
            .await
            .map_err(|e| e.at_stage(Stage::Writing))?;
        progress.stage_finished(Stage::Writing, &article.slug);
        ctx.article = Some(article.clone());

        // Output
        progress.stage_started(Stage::Output);
        let record = write_article(
            &self.settings.output_dir,
            &article,
            target_words,
            ctx.run_id.clone(),
        )
        .map_err(|e| e.at_stage(Stage::Output))?;
        progress.stage_finished(Stage::Output, &record.markdown_path.display().to_string());
        ctx.record = Some(record.clone());

        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
