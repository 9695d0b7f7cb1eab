//! Generation backend abstraction.
//!
//! The pipeline talks to a model through exactly one narrow seam:
//! `generate(template, structured_input) → structured_output`. Stages know
//! nothing about transport, authentication, or wire formats; provider
//! details live in one place ([`gemini`]) and tests inject a scripted
//! implementation through [`crate::config::DigestConfigBuilder::backend`].

pub mod gemini;

use crate::error::BackendError;
use crate::output::TokenUsage;
use crate::prompts;
use async_trait::async_trait;
use serde_json::Value;

/// Identifies one of the two fixed generation flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    /// Encoded PDF → summary.
    PdfSummarization,
    /// Summary → newline-separated key sentences.
    KeySentenceExtraction,
}

impl TemplateId {
    /// The fixed instruction template for this flow.
    pub fn template(self) -> &'static str {
        match self {
            TemplateId::PdfSummarization => prompts::PDF_SUMMARIZATION_PROMPT,
            TemplateId::KeySentenceExtraction => prompts::KEY_SENTENCE_PROMPT,
        }
    }

    /// Stable name used in logs and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TemplateId::PdfSummarization => "pdfSummary",
            TemplateId::KeySentenceExtraction => "extractKeySentences",
        }
    }
}

/// One successful backend generation.
#[derive(Debug, Clone)]
pub struct GenerationReply {
    /// Structured output conforming to the template's declared schema.
    pub output: Value,
    /// Token accounting; zeroed when the provider omits it.
    pub usage: TokenUsage,
}

/// A service that can run one of the fixed generation flows.
///
/// Implementations must be cheap to share (`Send + Sync`; the pipeline holds
/// one behind an `Arc`). Generation parameters — model, temperature, token
/// cap, timeout — are fixed at construction, keeping this seam as narrow as
/// the stages need.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run the flow identified by `template` over `input`.
    ///
    /// `input` is the template's structured request (for summarization,
    /// `{"pdfDataUri": …}`); the reply's `output` must conform to the
    /// template's declared response schema. A response that cannot be
    /// interpreted against that schema must surface as
    /// [`BackendError::Malformed`], never as a fabricated value.
    async fn generate(
        &self,
        template: TemplateId,
        input: Value,
    ) -> Result<GenerationReply, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_resolve_to_distinct_prompts() {
        let summary = TemplateId::PdfSummarization.template();
        let sentences = TemplateId::KeySentenceExtraction.template();
        assert!(summary.contains("\"summary\""));
        assert!(sentences.contains("\"keySentences\""));
        assert_ne!(summary, sentences);
    }

    #[test]
    fn template_names_are_stable() {
        assert_eq!(TemplateId::PdfSummarization.name(), "pdfSummary");
        assert_eq!(TemplateId::KeySentenceExtraction.name(), "extractKeySentences");
    }
}
