//! Gemini `generateContent` backend.
//!
//! The only production [`GenerationBackend`]. Each call posts the template
//! text, the structured request payload, and a JSON response schema to the
//! `models/{model}:generateContent` REST endpoint, then decodes the single
//! candidate back into the template's output shape.
//!
//! ## Why constrained JSON output?
//!
//! Both flows need machine-readable replies. Asking for prose and scraping
//! it is fragile; instead every request sets `responseMimeType` to
//! `application/json` and ships a `responseSchema`, so the model is decoded,
//! not parsed. Anything that still fails to decode is reported as
//! [`BackendError::Malformed`] and fails the run — this client never invents
//! a value to paper over a bad reply.

use crate::backend::{GenerationBackend, GenerationReply, TemplateId};
use crate::config::DigestConfig;
use crate::error::{BackendError, DigestError};
use crate::output::TokenUsage;
use crate::pipeline::sentences::KeySentenceRequest;
use crate::pipeline::summarize::SummarizationRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Google Generative Language API base.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables consulted for an API key, in priority order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Well-known model identifiers accepted by [`GeminiBackend`].
pub mod models {
    /// Fast, low-cost default. Handles inline PDFs up to 20 MB.
    pub const GEMINI_2_0_FLASH: &str = "gemini-2.0-flash";
    /// Newer flash generation; slightly better long-document recall.
    pub const GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
    /// Highest quality, highest latency. Rarely worth it for digestion.
    pub const GEMINI_2_5_PRO: &str = "gemini-2.5-pro";
}

/// Backend speaking the Gemini `generateContent` protocol.
///
/// Generation parameters are copied out of [`DigestConfig`] at construction
/// and never change afterwards; a backend is therefore safe to share across
/// any number of concurrent pipelines.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: usize,
    timeout_secs: u64,
    base_url: String,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ── Wire types: request ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
    response_mime_type: &'static str,
    response_schema: Value,
}

// ── Wire types: response ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiBackend {
    /// Create a backend from an API key and pipeline config.
    ///
    /// Fails only if the HTTP client cannot be built, which in practice
    /// means a broken TLS installation.
    pub fn new(api_key: impl Into<String>, config: &DigestConfig) -> Result<Self, DigestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| DigestError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.api_timeout_secs,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// Point the backend at a different base URL. Test hook for mock servers
    /// and proxies.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The JSON schema the model is constrained to for `template`.
    fn response_schema(template: TemplateId) -> Value {
        match template {
            TemplateId::PdfSummarization => json!({
                "type": "OBJECT",
                "properties": {
                    "summary": {
                        "type": "STRING",
                        "description": "A detailed summary of the document."
                    }
                },
                "required": ["summary"]
            }),
            TemplateId::KeySentenceExtraction => json!({
                "type": "OBJECT",
                "properties": {
                    "keySentences": {
                        "type": "STRING",
                        "description": "Key sentences, separated by a newline character."
                    }
                },
                "required": ["keySentences"]
            }),
        }
    }

    /// Assemble the user-turn parts for `template` from its typed request.
    ///
    /// The summarization payload is already a base64 data URI, so its parts
    /// are lifted out verbatim instead of being decoded and re-encoded.
    fn build_parts(template: TemplateId, input: &Value) -> Result<Vec<Part>, BackendError> {
        match template {
            TemplateId::PdfSummarization => {
                let request: SummarizationRequest = serde_json::from_value(input.clone())
                    .map_err(|e| {
                        BackendError::Malformed(format!(
                            "{} input is not a summarization request: {e}",
                            template.name()
                        ))
                    })?;
                let (media_type, data) = request.pdf_data_uri.parts().ok_or_else(|| {
                    BackendError::Malformed("pdfDataUri is not a base64 data URI".to_string())
                })?;
                Ok(vec![
                    Part::Text {
                        text: template.template().to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: media_type.to_string(),
                            data: data.to_string(),
                        },
                    },
                ])
            }
            TemplateId::KeySentenceExtraction => {
                let request: KeySentenceRequest = serde_json::from_value(input.clone())
                    .map_err(|e| {
                        BackendError::Malformed(format!(
                            "{} input is not a key-sentence request: {e}",
                            template.name()
                        ))
                    })?;
                Ok(vec![
                    Part::Text {
                        text: template.template().to_string(),
                    },
                    Part::Text {
                        text: format!("Document summary:\n{}", request.document_summary),
                    },
                ])
            }
        }
    }

    /// Map a reqwest transport failure onto the backend error taxonomy.
    fn classify_transport(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(
        &self,
        template: TemplateId,
        input: Value,
    ) -> Result<GenerationReply, BackendError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: Self::build_parts(template, &input)?,
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: "application/json",
                response_schema: Self::response_schema(template),
            },
        };

        debug!(template = template.name(), model = %self.model, "Calling generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // The API wraps errors in {"error": {...}}; fall back to the raw
            // body when it doesn't.
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(parsed) => match parsed.error.status {
                    Some(s) => format!("{} ({s})", parsed.error.message),
                    None => parsed.error.message,
                },
                Err(_) => body,
            };
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("response is not JSON: {e}")))?;

        let candidate = reply
            .candidates
            .first()
            .ok_or_else(|| BackendError::Malformed("response has no candidates".to_string()))?;

        let text = candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.iter().find_map(|p| p.text.as_deref()))
            .ok_or_else(|| {
                BackendError::Malformed(format!(
                    "candidate has no text (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ))
            })?;

        let output: Value = serde_json::from_str(text).map_err(|e| {
            BackendError::Malformed(format!("candidate text is not the requested JSON: {e}"))
        })?;

        let usage = reply
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        debug!(
            template = template.name(),
            tokens = usage.total_tokens,
            "generateContent succeeded"
        );

        Ok(GenerationReply { output, usage })
    }
}
