//! Application configuration for SeoForge.
//!
//! User config lives at `~/.seoforge/seoforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeoForgeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "seoforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".seoforge";

/// Accepted article lengths, in words.
pub const TARGET_WORDS_RANGE: RangeInclusive<u32> = 800..=4000;

/// Accepted number of competitor pages to analyze.
pub const COMPETITORS_RANGE: RangeInclusive<usize> = 0..=7;

// ---------------------------------------------------------------------------
// Config structs (matching seoforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Model selection and API key locations.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Retry behavior for text generation.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Search and page scraping.
    #[serde(default)]
    pub scraping: ScrapingConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory receiving the generated `.md`/`.html` pairs.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Article length target in words.
    #[serde(default = "default_target_words")]
    pub target_words: u32,

    /// Number of competitor pages to analyze.
    #[serde(default = "default_competitors")]
    pub competitors: usize,

    /// Language the article is written in.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            target_words: default_target_words(),
            competitors: default_competitors(),
            language: default_language(),
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}
fn default_target_words() -> u32 {
    2000
}
fn default_competitors() -> usize {
    3
}
fn default_language() -> String {
    "French".into()
}

/// `[models]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used for keyword, insight, brief, link and budget work.
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,

    /// Model used to write the article.
    #[serde(default = "default_writing_model")]
    pub writing_model: String,

    /// Analysis models tried after the preferred one, in order.
    #[serde(default = "default_analysis_fallbacks")]
    pub analysis_fallbacks: Vec<String>,

    /// Writing models tried after the preferred one, in order.
    #[serde(default = "default_writing_fallbacks")]
    pub writing_fallbacks: Vec<String>,

    /// Name of the env var holding the Google key (never store the key itself).
    #[serde(default = "default_google_api_key_env")]
    pub google_api_key_env: String,

    /// Name of the env var holding the Anthropic key.
    #[serde(default = "default_anthropic_api_key_env")]
    pub anthropic_api_key_env: String,

    /// Output token ceiling for the writing call.
    #[serde(default = "default_writing_max_tokens")]
    pub writing_max_tokens: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            analysis_model: default_analysis_model(),
            writing_model: default_writing_model(),
            analysis_fallbacks: default_analysis_fallbacks(),
            writing_fallbacks: default_writing_fallbacks(),
            google_api_key_env: default_google_api_key_env(),
            anthropic_api_key_env: default_anthropic_api_key_env(),
            writing_max_tokens: default_writing_max_tokens(),
        }
    }
}

fn default_analysis_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_writing_model() -> String {
    "claude-sonnet-4-5-20250929".into()
}
fn default_analysis_fallbacks() -> Vec<String> {
    [
        "gemini-2.5-pro",
        "gemini-2.0-flash",
        "gemini-2.0-flash-lite",
        "gemini-1.5-flash",
        "gemini-1.5-pro",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_writing_fallbacks() -> Vec<String> {
    ["claude-opus-4-1-20250805", "claude-opus-4-20250514"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_google_api_key_env() -> String {
    "GOOGLE_API_KEY".into()
}
fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_writing_max_tokens() -> u32 {
    8000
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per model on transient overload.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff; attempt `n` waits `backoff_secs * (n + 1)`.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}
fn default_backoff_secs() -> u64 {
    5
}

/// `[scraping]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// Timeout for search result pages.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for competitor and category page fetches.
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Lower bound of the randomized pause between page fetches.
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,

    /// Upper bound of the randomized pause between page fetches.
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,

    /// Characters kept from each competitor page body.
    #[serde(default = "default_page_max_chars")]
    pub page_max_chars: usize,

    /// Characters kept from each search snippet.
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,

    /// `hl` parameter sent to the search engine.
    #[serde(default = "default_search_language")]
    pub search_language: String,

    /// `gl` parameter sent to the search engine.
    #[serde(default = "default_search_region")]
    pub search_region: String,

    /// `kl` parameter sent to DuckDuckGo (`{region}-{language}` form).
    #[serde(default = "default_duckduckgo_region")]
    pub duckduckgo_region: String,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            page_timeout_secs: default_page_timeout_secs(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            page_max_chars: default_page_max_chars(),
            snippet_max_chars: default_snippet_max_chars(),
            search_language: default_search_language(),
            search_region: default_search_region(),
            duckduckgo_region: default_duckduckgo_region(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}
fn default_page_timeout_secs() -> u64 {
    15
}
fn default_delay_min_ms() -> u64 {
    500
}
fn default_delay_max_ms() -> u64 {
    1500
}
fn default_page_max_chars() -> usize {
    3500
}
fn default_snippet_max_chars() -> usize {
    400
}
fn default_search_language() -> String {
    "fr".into()
}
fn default_search_region() -> String {
    "fr".into()
}
fn default_duckduckgo_region() -> String {
    "fr-fr".into()
}

// ---------------------------------------------------------------------------
// Generate settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings for one `generate` run.
#[derive(Debug, Clone)]
pub struct GenerateSettings {
    /// Article length target in words.
    pub target_words: u32,
    /// Competitor pages wanted; 0 disables competitor analysis.
    pub competitors: usize,
    /// Output directory.
    pub output_dir: PathBuf,
    /// Writing language.
    pub language: String,
    /// Output token ceiling for the writing call.
    pub writing_max_tokens: u32,
}

impl From<&AppConfig> for GenerateSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            target_words: config.defaults.target_words,
            competitors: config.defaults.competitors,
            output_dir: expand_home(&config.defaults.output_dir),
            language: config.defaults.language.clone(),
            writing_max_tokens: config.models.writing_max_tokens,
        }
    }
}

impl GenerateSettings {
    /// Reject settings outside the accepted ranges.
    pub fn validate(&self) -> Result<()> {
        if !TARGET_WORDS_RANGE.contains(&self.target_words) {
            return Err(SeoForgeError::validation(format!(
                "target words {} outside {}..={}",
                self.target_words,
                TARGET_WORDS_RANGE.start(),
                TARGET_WORDS_RANGE.end()
            )));
        }
        if !COMPETITORS_RANGE.contains(&self.competitors) {
            return Err(SeoForgeError::validation(format!(
                "competitor count {} outside {}..={}",
                self.competitors,
                COMPETITORS_RANGE.start(),
                COMPETITORS_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.seoforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SeoForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.seoforge/seoforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SeoForgeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SeoForgeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    init_config_in(&dir)
}

/// Write a default config file into `dir`, creating it if needed.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| SeoForgeError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| SeoForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SeoForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a key from the named env var, failing with setup guidance.
pub fn read_api_key(var_name: &str, provider: &str, signup_url: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(SeoForgeError::config(format!(
            "{provider} API key not found. Set the {var_name} environment variable.\n\
             Get a key at {signup_url}"
        ))),
    }
}

/// Check that both the analysis and the writing keys are present.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    read_api_key(
        &config.models.google_api_key_env,
        "Google",
        "https://aistudio.google.com/apikey",
    )?;
    read_api_key(
        &config.models.anthropic_api_key_env,
        "Anthropic",
        "https://console.anthropic.com/settings/keys",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("GOOGLE_API_KEY"));
        assert!(toml_str.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
target_words = 1500

[models]
analysis_model = "gemini-2.0-flash"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.target_words, 1500);
        assert_eq!(config.defaults.competitors, 3);
        assert_eq!(config.models.analysis_model, "gemini-2.0-flash");
        assert_eq!(config.models.writing_max_tokens, 8000);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.scraping.page_max_chars, 3500);
        assert_eq!(config.scraping.search_region, "fr");
        assert_eq!(config.scraping.duckduckgo_region, "fr-fr");
    }

    #[test]
    fn load_and_init_in_tempdir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = init_config_in(dir.path()).expect("init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.defaults.output_dir, "output");
        assert_eq!(loaded.scraping.search_region, "fr");
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("seoforge.toml");
        std::fs::write(&path, "[defaults\n").expect("write");
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, SeoForgeError::Config { .. }));
    }

    #[test]
    fn settings_range_validation() {
        let mut settings = GenerateSettings::from(&AppConfig::default());
        assert!(settings.validate().is_ok());

        settings.target_words = 799;
        assert!(settings.validate().is_err());

        settings.target_words = 4000;
        settings.competitors = 8;
        assert!(settings.validate().is_err());

        settings.competitors = 0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        config.models.google_api_key_env = "SF_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_keys(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn expand_home_leaves_relative_paths() {
        assert_eq!(expand_home("output"), PathBuf::from("output"));
    }
}
