//! Text generation for SeoForge.
//!
//! Stages only see [`TextGenerator`]: submit a [`Prompt`], get text back or a
//! classified [`GenerationError`]. Behind it, [`FallbackGenerator`] walks a
//! preference-ordered list of models on one [`ModelBackend`] (Gemini or
//! Anthropic), driven by the explicit state machine in [`retry`].

pub mod fallback;
pub mod providers;
pub mod retry;

use async_trait::async_trait;
use seoforge_shared::GenerationError;

pub use fallback::{FallbackGenerator, ModelBackend, discover_candidates};
pub use providers::{AnthropicBackend, GeminiBackend, classify_status};
pub use retry::{RetryPolicy, RetryState};

/// Output tokens requested when a prompt does not say otherwise.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    pub max_tokens: Option<u32>,
}

impl Prompt {
    /// A prompt with only a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            user: text.into(),
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Requested output tokens, or [`DEFAULT_MAX_TOKENS`].
    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

/// Capability: turn a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}
