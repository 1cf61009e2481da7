//! Shared types, error model, and configuration for SeoForge.
//!
//! This crate is the foundation depended on by all other SeoForge crates.
//! It provides:
//! - [`SeoForgeError`], [`GenerationError`], [`StructuredError`]: the error taxonomy
//! - Domain types ([`SelectedKeyword`], [`EditorialBrief`], [`WordBudget`], [`InternalLink`], ...)
//! - Configuration ([`AppConfig`], [`GenerateSettings`], config loading)
//! - JSON extraction from model output ([`extract_json`], [`parse_structured`])

pub mod config;
pub mod error;
pub mod json;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, COMPETITORS_RANGE, DefaultsConfig, GenerateSettings, ModelsConfig, RetryConfig,
    ScrapingConfig, TARGET_WORDS_RANGE, config_dir, config_file_path, expand_home, init_config,
    init_config_in, load_config, load_config_from, read_api_key, validate_api_keys,
};
pub use error::{GenerationError, Result, SeoForgeError, Stage, StructuredError};
pub use json::{extract_json, parse_structured};
pub use types::{
    CompetitorRecord, EditorialBrief, FaqItem, GeneratedArticle, InsightReport, InternalLink,
    InternalLinkCandidate, KeywordCandidate, RunId, SearchIntent, Section, SectionBudget,
    SelectedKeyword, Subsection, WordBudget,
};
