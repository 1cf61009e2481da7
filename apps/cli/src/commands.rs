//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use seoforge_core::{
    PipelineDriver, ProgressReporter, RunFailure, RunInputs, SourceAcquisitionCascade,
    list_history,
};
use seoforge_crawler::{
    CompetitorSource, DelayPolicy, DuckDuckGoEngine, GoogleEngine, HttpPageFetcher, PageFetcher,
    ScrapeLimits, ScrapedSerpSource,
};
use seoforge_discovery::{HttpSitemapSource, SitemapOptions, SitemapSource, parse_keyword_csv};
use seoforge_llm::{
    AnthropicBackend, FallbackGenerator, GeminiBackend, ModelBackend, RetryPolicy, TextGenerator,
    discover_candidates,
};
use seoforge_shared::{
    AppConfig, GenerateSettings, Stage, expand_home, init_config, load_config, read_api_key,
    validate_api_keys,
};

/// Request timeout for analysis calls.
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(90);
/// Request timeout for the article call, which produces long output.
const WRITING_TIMEOUT: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SeoForge: keyword sheet and sitemap in, SEO article out.
#[derive(Parser)]
#[command(
    name = "seoforge",
    version,
    about = "Generate SEO blog articles from a keyword sheet and a sitemap.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline and write the article.
    Generate {
        /// Keyword sheet (CSV export from a keyword tool).
        #[arg(short, long)]
        keywords: PathBuf,

        /// Sitemap URL of the site the article is for.
        #[arg(short, long)]
        sitemap: String,

        /// Category or target page giving extra context.
        #[arg(long)]
        category: Option<String>,

        /// Article length target in words.
        #[arg(short, long)]
        words: Option<u32>,

        /// Competitor pages to analyze (0 disables competitor analysis).
        #[arg(short, long)]
        competitors: Option<usize>,

        /// Preferred analysis model.
        #[arg(long)]
        analysis_model: Option<String>,

        /// Preferred writing model.
        #[arg(long)]
        writing_model: Option<String>,

        /// Output directory.
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Preview how a keyword sheet is read.
    Keywords {
        /// Keyword sheet to parse.
        csv: PathBuf,

        /// Rows to show.
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// List the page URLs a sitemap publishes.
    Sitemap {
        /// Sitemap or sitemap index URL.
        url: String,
    },

    /// List articles already generated.
    History {
        /// Output directory (defaults to the configured one).
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "seoforge=info",
        1 => "seoforge=debug",
        _ => "seoforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            keywords,
            sitemap,
            category,
            words,
            competitors,
            analysis_model,
            writing_model,
            out,
        } => {
            let overrides = GenerateOverrides {
                words,
                competitors,
                analysis_model,
                writing_model,
                out,
            };
            cmd_generate(&keywords, &sitemap, category.as_deref(), overrides).await
        }
        Command::Keywords { csv, limit } => cmd_keywords(&csv, limit),
        Command::Sitemap { url } => cmd_sitemap(&url).await,
        Command::History { out } => cmd_history(out.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

/// Flag values that take precedence over the config file.
struct GenerateOverrides {
    words: Option<u32>,
    competitors: Option<usize>,
    analysis_model: Option<String>,
    writing_model: Option<String>,
    out: Option<String>,
}

impl GenerateOverrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(words) = self.words {
            config.defaults.target_words = words;
        }
        if let Some(competitors) = self.competitors {
            config.defaults.competitors = competitors;
        }
        if let Some(model) = self.analysis_model {
            config.models.analysis_model = model;
        }
        if let Some(model) = self.writing_model {
            config.models.writing_model = model;
        }
        if let Some(out) = self.out {
            config.defaults.output_dir = out;
        }
    }
}

async fn cmd_generate(
    keywords_path: &Path,
    sitemap_url: &str,
    category_url: Option<&str>,
    overrides: GenerateOverrides,
) -> Result<()> {
    let mut config = load_config()?;
    overrides.apply(&mut config);
    validate_api_keys(&config)?;

    let settings = GenerateSettings::from(&config);
    settings.validate()?;

    let csv = std::fs::read(keywords_path)
        .map_err(|e| eyre!("cannot read keyword sheet '{}': {e}", keywords_path.display()))?;

    let reporter = CliProgress::new();
    let start = Instant::now();

    reporter.note("Reading keyword sheet, sitemap and category page");
    let sitemap = HttpSitemapSource::new(SitemapOptions {
        timeout_secs: config.scraping.timeout_secs,
        ..SitemapOptions::default()
    })?;
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(Duration::from_secs(
        config.scraping.page_timeout_secs,
    ))?);
    let inputs = RunInputs::gather(&csv, &sitemap, sitemap_url, fetcher.as_ref(), category_url).await?;

    reporter.note("Resolving available models");
    let (analysis, writing) = build_generators(&config).await?;
    let cascade = build_cascade(&config, fetcher, analysis.clone())?;

    info!(
        keywords = inputs.keywords.len(),
        sitemap_urls = inputs.sitemap_urls.len(),
        target_words = settings.target_words,
        competitors = settings.competitors,
        "starting generation"
    );

    let mut driver = PipelineDriver::new(settings, analysis, writing, cascade)?;
    let ctx = match driver.run(&inputs, &reporter).await {
        Ok(ctx) => ctx,
        Err(failure) => {
            reporter.finish();
            print_failure(&failure);
            return Err(failure.error.into());
        }
    };
    reporter.finish();

    let record = ctx
        .record
        .as_ref()
        .ok_or_else(|| eyre!("run finished without writing files"))?;
    let provenance = ctx
        .acquisition
        .as_ref()
        .map_or("unavailable", |a| a.provenance.label());
    let (accepted, rejected) = ctx
        .links
        .as_ref()
        .map_or((0, 0), |l| (l.links.len(), l.rejected.len()));

    println!();
    println!("  Article generated!");
    println!("  Keyword:     {}", record.keyword);
    println!("  Competitors: {provenance}");
    println!("  Links:       {accepted} accepted, {rejected} rejected");
    println!("  Words:       {} (target {})", record.word_count, record.target_words);
    println!("  Markdown:    {}", record.markdown_path.display());
    println!("  HTML:        {}", record.html_path.display());
    println!("  Time:        {:.1}s", start.elapsed().as_secs_f64());
    println!();

    Ok(())
}

/// Analysis (Gemini) and writing (Anthropic) generators with model fallback.
async fn build_generators(
    config: &AppConfig,
) -> Result<(Arc<dyn TextGenerator>, Arc<dyn TextGenerator>)> {
    let policy = RetryPolicy::from(&config.retry);

    let google_key = read_api_key(
        &config.models.google_api_key_env,
        "Google",
        "https://aistudio.google.com/apikey",
    )?;
    let gemini: Arc<dyn ModelBackend> = Arc::new(GeminiBackend::new(google_key, ANALYSIS_TIMEOUT)?);
    let analysis_models = discover_candidates(
        gemini.as_ref(),
        &config.models.analysis_model,
        &config.models.analysis_fallbacks,
    )
    .await;
    info!(models = ?analysis_models, "analysis model candidates");

    let anthropic_key = read_api_key(
        &config.models.anthropic_api_key_env,
        "Anthropic",
        "https://console.anthropic.com/settings/keys",
    )?;
    let anthropic: Arc<dyn ModelBackend> =
        Arc::new(AnthropicBackend::new(anthropic_key, WRITING_TIMEOUT)?);
    let mut writing_models = vec![config.models.writing_model.clone()];
    writing_models.extend(config.models.writing_fallbacks.iter().cloned());

    let analysis: Arc<dyn TextGenerator> =
        Arc::new(FallbackGenerator::new(gemini, analysis_models, policy));
    let writing: Arc<dyn TextGenerator> =
        Arc::new(FallbackGenerator::new(anthropic, writing_models, policy));
    Ok((analysis, writing))
}

/// Google, then DuckDuckGo, then model synthesis.
fn build_cascade(
    config: &AppConfig,
    fetcher: Arc<dyn PageFetcher>,
    synthesizer: Arc<dyn TextGenerator>,
) -> Result<SourceAcquisitionCascade> {
    let scraping = &config.scraping;
    let timeout = Duration::from_secs(scraping.timeout_secs);
    let delay = DelayPolicy::new(
        Duration::from_millis(scraping.delay_min_ms),
        Duration::from_millis(scraping.delay_max_ms),
    );
    let limits = ScrapeLimits::from(scraping);

    let google = ScrapedSerpSource::new(
        Box::new(GoogleEngine::from(scraping)),
        fetcher.clone(),
        timeout,
    )?
    .with_delay(delay)
    .with_limits(limits);
    let duckduckgo = ScrapedSerpSource::new(
        Box::new(DuckDuckGoEngine::from(scraping)),
        fetcher,
        timeout,
    )?
    .with_delay(delay)
    .with_limits(limits);

    let sources: Vec<Arc<dyn CompetitorSource>> = vec![Arc::new(google), Arc::new(duckduckgo)];
    Ok(SourceAcquisitionCascade::new(sources).with_synthesizer(synthesizer))
}

fn print_failure(failure: &RunFailure) {
    let stage = failure
        .error
        .stage()
        .map_or_else(|| "setup".to_string(), |s| s.to_string());
    eprintln!();
    eprintln!("  Generation stopped at stage: {stage}");
    eprintln!("  Cause: {}", failure.error);

    if let Some(keyword) = &failure.context.keyword {
        eprintln!("  Keyword chosen before the failure: {}", keyword.text);
    }
    if failure.error.is_quota_exhausted() {
        eprintln!();
        eprintln!("  The API quota for this key is exhausted. To continue:");
        eprintln!("    - enable billing on the Google AI Studio / Cloud project of the key,");
        eprintln!("    - or wait for the daily quota to reset,");
        eprintln!("    - or pass a cheaper model with --analysis-model.");
    }
    eprintln!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        self.spinner.set_message(format!("{}...", capitalize(stage.as_str())));
    }

    fn stage_finished(&self, stage: Stage, detail: &str) {
        self.spinner
            .println(format!("  ✓ {}: {detail}", capitalize(stage.as_str())));
    }

    fn note(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Inspection commands
// ---------------------------------------------------------------------------

fn cmd_keywords(path: &Path, limit: usize) -> Result<()> {
    let bytes = std::fs::read(path)
        .map_err(|e| eyre!("cannot read keyword sheet '{}': {e}", path.display()))?;
    let candidates = parse_keyword_csv(&bytes)?;

    println!("{} keywords in {}", candidates.len(), path.display());
    println!();
    println!("  {:<50} {:>8} {:>5} {:>6}", "keyword", "volume", "kd", "cpc");
    for c in candidates.iter().take(limit) {
        println!("  {:<50} {:>8} {:>5} {:>6.2}", c.text, c.volume, c.difficulty, c.cpc);
    }
    if candidates.len() > limit {
        println!("  ... {} more", candidates.len() - limit);
    }
    Ok(())
}

async fn cmd_sitemap(url: &str) -> Result<()> {
    let config = load_config()?;
    let source = HttpSitemapSource::new(SitemapOptions {
        timeout_secs: config.scraping.timeout_secs,
        ..SitemapOptions::default()
    })?;
    let urls = source.list_urls(url).await?;

    for page in &urls {
        println!("{page}");
    }
    info!(count = urls.len(), "sitemap listed");
    Ok(())
}

fn cmd_history(out: Option<&str>) -> Result<()> {
    let dir = match out {
        Some(dir) => expand_home(dir),
        None => GenerateSettings::from(&load_config()?).output_dir,
    };
    let history = list_history(&dir)?;

    if history.is_empty() {
        println!("No articles in {}", dir.display());
        return Ok(());
    }
    for entry in &history {
        let formats = match (&entry.markdown, &entry.html) {
            (Some(_), Some(_)) => "md+html",
            (Some(_), None) => "md",
            (None, Some(_)) => "html",
            (None, None) => "-",
        };
        println!(
            "  {}  {:<60} {formats}",
            entry.generated_at.format("%Y-%m-%d %H:%M"),
            entry.slug
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
