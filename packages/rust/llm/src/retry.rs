//! Retry-then-fallback policy as an explicit state machine.
//!
//! ```text
//! Trying(m, a) --success------------------------------> done
//! Trying(m, a) --ModelNotFound-----------------------> NextModel(m)
//! Trying(m, a) --TransientOverload, a < max_retries--> Backoff(m, a+1, base*(a+1))
//! Trying(m, a) --TransientOverload, a = max_retries--> NextModel(m)
//! Trying(m, a) --QuotaExhausted | Other--------------> error (fatal, unretried)
//! Backoff(m, a, _) ----------------------------------> Trying(m, a)
//! NextModel(m) --m+1 < candidates--------------------> Trying(m+1, 0)
//! NextModel(m) --otherwise---------------------------> Exhausted
//! ```

use std::time::Duration;

use seoforge_shared::{GenerationError, RetryConfig};

/// Where a generation call currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to call candidate `model` for the `attempt`-th time (0-based).
    Trying { model: usize, attempt: u32 },
    /// Waiting `wait` before calling `model` again.
    Backoff {
        model: usize,
        attempt: u32,
        wait: Duration,
    },
    /// Candidate `from` is given up on.
    NextModel { from: usize },
    /// Every candidate was given up on.
    Exhausted,
}

impl RetryState {
    pub fn start() -> Self {
        Self::Trying {
            model: 0,
            attempt: 0,
        }
    }
}

/// Bounded retries per model with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts on the same model after a transient failure.
    pub max_retries: u32,
    /// Attempt `a` waits `backoff_base * (a + 1)` before retrying.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(config.backoff_secs),
        }
    }
}

impl RetryPolicy {
    /// Transition after a failed `Trying` call.
    ///
    /// Quota exhaustion and unclassified errors are returned as `Err`: they
    /// end the call without touching other models.
    pub fn on_failure(
        &self,
        model: usize,
        attempt: u32,
        error: &GenerationError,
    ) -> Result<RetryState, GenerationError> {
        match error {
            GenerationError::ModelNotFound { .. } => Ok(RetryState::NextModel { from: model }),
            GenerationError::TransientOverload { .. } if attempt < self.max_retries => {
                Ok(RetryState::Backoff {
                    model,
                    attempt: attempt + 1,
                    wait: self.backoff_base * (attempt + 1),
                })
            }
            GenerationError::TransientOverload { .. } => Ok(RetryState::NextModel { from: model }),
            GenerationError::QuotaExhausted { .. }
            | GenerationError::Other { .. }
            | GenerationError::Exhausted { .. } => Err(error.clone()),
        }
    }

    /// Transition out of a non-`Trying` state.
    pub fn advance(&self, state: RetryState, candidates: usize) -> RetryState {
        match state {
            RetryState::Backoff { model, attempt, .. } => RetryState::Trying { model, attempt },
            RetryState::NextModel { from } if from + 1 < candidates => RetryState::Trying {
                model: from + 1,
                attempt: 0,
            },
            RetryState::NextModel { .. } => RetryState::Exhausted,
            other => other,
        }
    }
}
