//! Google Gemini (`generativelanguage.googleapis.com`) backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use seoforge_shared::GenerationError;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{api_client, classify_status, classify_transport};
use crate::Prompt;
use crate::fallback::ModelBackend;

/// Default API root.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini REST backend.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> seoforge_shared::Result<Self> {
        Ok(Self {
            client: api_client(timeout)?,
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.into(),
        })
    }

    /// Point the backend at another API root (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn provider(&self) -> &str {
        "gemini"
    }

    #[instrument(skip_all, fields(model = %model))]
    async fn generate_with(&self, model: &str, prompt: &Prompt) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &prompt.user }],
            }],
            system_instruction: prompt.system.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: prompt.max_tokens,
            },
        };

        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(model, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(model, status.as_u16(), &text));
        }

        let parsed: GenerateResponse = resp.json().await.map_err(|e| GenerationError::Other {
            model: model.into(),
            detail: format!("failed to parse Gemini response: {e}"),
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::Other {
                model: model.into(),
                detail: "Gemini response missing text content".into(),
            });
        }
        debug!(chars = text.len(), "gemini response received");
        Ok(text)
    }

    async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let url = format!("{}/models", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .query(&[("pageSize", "1000")])
            .send()
            .await
            .map_err(|e| classify_transport("", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status("", status.as_u16(), &text));
        }

        let parsed: ModelList = resp.json().await.map_err(|e| GenerationError::Other {
            model: String::new(),
            detail: format!("failed to parse model list: {e}"),
        })?;

        Ok(parsed
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods.is_empty()
                    || m.supported_generation_methods
                        .iter()
                        .any(|method| method == "generateContent")
            })
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .filter(|name| name.contains("gemini"))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}
