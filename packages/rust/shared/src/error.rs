//! Error types for SeoForge.
//!
//! Library crates use [`SeoForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SeoForge operations.
#[derive(Debug, thiserror::Error)]
pub enum SeoForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during scraping or sitemap discovery.
    #[error("network error: {0}")]
    Network(String),

    /// HTML, XML or CSV parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Text generation failed after retries and model fallback.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A model response could not be turned into the expected structure.
    #[error(transparent)]
    Structured(#[from] StructuredError),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty keyword, out-of-range setting, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Markdown/HTML conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A pipeline stage failed with no safe fallback; the run stops here.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<SeoForgeError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SeoForgeError>;

impl SeoForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the failing stage to an error.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error halted, if it is a stage failure.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True when the underlying cause is an exhausted generator quota.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            Self::Generation(GenerationError::QuotaExhausted { .. }) => true,
            Self::Stage { source, .. } => source.is_quota_exhausted(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Generation errors
// ---------------------------------------------------------------------------

/// Failure signals from a text generator backend.
///
/// Backends classify raw API failures into these variants; the retry layer
/// decides what to do with each.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The requested model does not exist or the key cannot access it.
    #[error("model '{model}' not available: {detail}")]
    ModelNotFound { model: String, detail: String },

    /// Rate limit or quota exhausted. Fatal for the run.
    #[error(
        "generation quota exhausted for model '{model}': {detail}. \
         Enable billing or raise the quota for this API key, then retry."
    )]
    QuotaExhausted { model: String, detail: String },

    /// Temporary overload (503, overloaded, timeout). Retried with backoff.
    #[error("model '{model}' temporarily unavailable: {detail}")]
    TransientOverload { model: String, detail: String },

    /// Any other failure. Propagated immediately.
    #[error("generation failed on model '{model}': {detail}")]
    Other { model: String, detail: String },

    /// Every candidate model failed.
    #[error("no model could answer (tried: {}); last error: {last}", tried.join(", "))]
    Exhausted { tried: Vec<String>, last: String },
}

// ---------------------------------------------------------------------------
// Structured-response errors
// ---------------------------------------------------------------------------

/// Failure to turn free-form model output into a typed value.
#[derive(Debug, thiserror::Error)]
pub enum StructuredError {
    /// No fenced block or balanced brace/bracket span was found.
    #[error("no JSON found in model response (starts with: {excerpt:?})")]
    NoJsonFound { excerpt: String },

    /// A JSON-looking span was found but did not deserialize.
    #[error("malformed JSON in model response: {source} (span starts with: {excerpt:?})")]
    Malformed {
        excerpt: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    KeywordSelection,
    CompetitorAnalysis,
    Insights,
    Brief,
    InternalLinks,
    WordBudget,
    Writing,
    Output,
}

impl Stage {
    /// Human-readable stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeywordSelection => "keyword selection",
            Self::CompetitorAnalysis => "competitor analysis",
            Self::Insights => "insights",
            Self::Brief => "editorial brief",
            Self::InternalLinks => "internal links",
            Self::WordBudget => "word budget",
            Self::Writing => "article writing",
            Self::Output => "output",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
