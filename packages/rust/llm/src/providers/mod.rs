//! HTTP backends for the two model families SeoForge uses.

mod anthropic;
mod gemini;

use std::time::Duration;

use reqwest::Client;
use seoforge_shared::{GenerationError, Result, SeoForgeError};

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;

/// Characters of an error body kept in error details.
const DETAIL_CHARS: usize = 300;

/// Map an unsuccessful HTTP status to a generation failure.
pub fn classify_status(model: &str, status: u16, body: &str) -> GenerationError {
    let model = model.to_string();
    let detail = format!(
        "HTTP {status}: {}",
        seoforge_shared::text::truncate_chars(body.trim(), DETAIL_CHARS)
    );
    match status {
        404 | 403 => GenerationError::ModelNotFound { model, detail },
        429 => GenerationError::QuotaExhausted { model, detail },
        500 | 502 | 503 | 504 | 529 => GenerationError::TransientOverload { model, detail },
        _ => GenerationError::Other { model, detail },
    }
}

/// Map a transport failure: timeouts and refused connections are transient.
pub(crate) fn classify_transport(model: &str, error: &reqwest::Error) -> GenerationError {
    let model = model.to_string();
    let detail = error.to_string();
    if error.is_timeout() || error.is_connect() {
        GenerationError::TransientOverload { model, detail }
    } else {
        GenerationError::Other { model, detail }
    }
}

pub(crate) fn api_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("SeoForge/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| SeoForgeError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            classify_status("m", 404, ""),
            GenerationError::ModelNotFound { .. }
        ));
        assert!(matches!(
            classify_status("m", 403, "PERMISSION_DENIED"),
            GenerationError::ModelNotFound { .. }
        ));
        assert!(matches!(
            classify_status("m", 429, "RESOURCE_EXHAUSTED"),
            GenerationError::QuotaExhausted { .. }
        ));
        for status in [500, 502, 503, 504, 529] {
            assert!(matches!(
                classify_status("m", status, "overloaded"),
                GenerationError::TransientOverload { .. }
            ));
        }
        assert!(matches!(
            classify_status("m", 400, "bad"),
            GenerationError::Other { .. }
        ));
    }
}
