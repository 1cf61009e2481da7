//! Model fallback over a single provider backend.

use std::sync::Arc;

use async_trait::async_trait;
use seoforge_shared::GenerationError;
use tracing::{debug, info, instrument, warn};

use crate::retry::{RetryPolicy, RetryState};
use crate::{Prompt, TextGenerator};

/// A provider API that can run a prompt on a named model.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Provider name for tracing.
    fn provider(&self) -> &str;

    /// Run `prompt` on `model`, classifying any failure.
    async fn generate_with(&self, model: &str, prompt: &Prompt) -> Result<String, GenerationError>;

    /// Models this key can use. Backends without discovery return an empty list.
    async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        Ok(Vec::new())
    }
}

/// Order candidate models by what the backend reports as available.
///
/// The preferred model always comes first. Listed fallbacks follow in
/// preference order, then any other available models sorted by name. When
/// discovery fails or finds nothing, the static list is used as is.
pub async fn discover_candidates(
    backend: &dyn ModelBackend,
    preferred: &str,
    fallbacks: &[String],
) -> Vec<String> {
    let static_list = || dedup(std::iter::once(preferred.to_string()).chain(fallbacks.iter().cloned()));

    let available = match backend.list_models().await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => return static_list(),
        Err(e) => {
            warn!(provider = backend.provider(), error = %e, "model discovery failed, using static list");
            return static_list();
        }
    };

    let ordered: Vec<String> = fallbacks
        .iter()
        .filter(|m| available.contains(m))
        .cloned()
        .collect();
    let mut extras: Vec<String> = available
        .iter()
        .filter(|m| !fallbacks.contains(m))
        .cloned()
        .collect();
    extras.sort();

    let candidates = dedup(
        std::iter::once(preferred.to_string())
            .chain(ordered)
            .chain(extras),
    );
    debug!(provider = backend.provider(), candidates = ?candidates, "model candidates discovered");
    candidates
}

fn dedup(models: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for model in models {
        if !model.is_empty() && !out.contains(&model) {
            out.push(model);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// FallbackGenerator
// ---------------------------------------------------------------------------

/// [`TextGenerator`] that retries and falls back across candidate models.
pub struct FallbackGenerator {
    backend: Arc<dyn ModelBackend>,
    candidates: Vec<String>,
    policy: RetryPolicy,
}

impl FallbackGenerator {
    /// `candidates` are tried in order; the first is the preferred model.
    pub fn new(backend: Arc<dyn ModelBackend>, candidates: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            candidates: dedup(candidates.into_iter()),
            policy,
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

#[async_trait]
impl TextGenerator for FallbackGenerator {
    #[instrument(skip_all, fields(provider = %self.backend.provider()))]
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let mut state = RetryState::start();
        let mut last_error = String::from("no candidate models configured");

        if self.candidates.is_empty() {
            state = RetryState::Exhausted;
        }

        loop {
            match state {
                RetryState::Trying { model, attempt } => {
                    let name = &self.candidates[model];
                    debug!(model = %name, attempt, "calling model");
                    match self.backend.generate_with(name, prompt).await {
                        Ok(text) => {
                            if model > 0 {
                                info!(model = %name, preferred = %self.candidates[0], "fallback model used");
                            }
                            return Ok(text);
                        }
                        Err(e) => {
                            warn!(model = %name, attempt, error = %e, "generation failed");
                            last_error = e.to_string();
                            state = self.policy.on_failure(model, attempt, &e)?;
                        }
                    }
                }
                RetryState::Backoff { wait, .. } => {
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                    state = self.policy.advance(state, self.candidates.len());
                }
                RetryState::NextModel { .. } => {
                    state = self.policy.advance(state, self.candidates.len());
                }
                RetryState::Exhausted => {
                    return Err(GenerationError::Exhausted {
                        tried: self.candidates.clone(),
                        last: last_error,
                    });
                }
            }
        }
    }
}
