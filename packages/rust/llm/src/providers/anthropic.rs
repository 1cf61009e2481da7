//! Anthropic Messages API backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use seoforge_shared::GenerationError;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{api_client, classify_status, classify_transport};
use crate::Prompt;
use crate::fallback::ModelBackend;

/// Default API root.
pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic REST backend.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> seoforge_shared::Result<Self> {
        Ok(Self {
            client: api_client(timeout)?,
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_BASE.into(),
        })
    }

    /// Point the backend at another API root (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self, model: &str) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim()).map_err(|_| GenerationError::Other {
                model: model.into(),
                detail: "invalid Anthropic API key".into(),
            })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    fn provider(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip_all, fields(model = %model))]
    async fn generate_with(&self, model: &str, prompt: &Prompt) -> Result<String, GenerationError> {
        let body = MessagesRequest {
            model,
            max_tokens: prompt.max_tokens_or_default(),
            system: prompt.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &prompt.user,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .headers(self.headers(model)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(model, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(model, status.as_u16(), &text));
        }

        let parsed: MessagesResponse = resp.json().await.map_err(|e| GenerationError::Other {
            model: model.into(),
            detail: format!("failed to parse Anthropic response: {e}"),
        })?;

        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if answer.trim().is_empty() {
            return Err(GenerationError::Other {
                model: model.into(),
                detail: "Anthropic response missing text content".into(),
            });
        }
        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            debug!("response stopped at max_tokens");
        }
        Ok(answer)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> AnthropicBackend {
        AnthropicBackend::new("sk-test", Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn sends_system_prompt_and_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-sonnet-4-5-20250929",
                "max_tokens": 8000,
                "system": "Tu es rédacteur."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "text", "text": "===MARKDOWN==="},
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": "# Titre"}
                ],
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let prompt = Prompt::user("Écris")
            .with_system("Tu es rédacteur.")
            .with_max_tokens(8000);
        let out = backend(&server)
            .generate_with("claude-sonnet-4-5-20250929", &prompt)
            .await
            .unwrap();
        assert_eq!(out, "===MARKDOWN===\n# Titre");
    }

    #[tokio::test]
    async fn overloaded_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded_error"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate_with("claude-opus-4-20250514", &Prompt::user("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::TransientOverload { .. }));
    }
}
