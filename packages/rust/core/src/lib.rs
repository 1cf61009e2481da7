//! Core pipeline orchestration and domain logic for SeoForge.
//!
//! This crate ties together keyword discovery, competitor scraping, the
//! model-driven stages and article output into the end-to-end `generate`
//! workflow.

pub mod cascade;
pub mod links;
pub mod output;
pub mod pipeline;
pub mod stages;

pub use cascade::{Acquisition, NO_COMPETITOR_DATA, Provenance, SourceAcquisitionCascade};
pub use links::{LinkValidation, LinkValidator, propose_internal_links};
pub use output::{HistoryEntry, RunHistory, RunRecord, list_history, write_article};
pub use pipeline::{
    PipelineDriver, ProgressReporter, RunContext, RunFailure, RunInputs, SilentProgress,
};
