//! Summarization stage: encoded document → natural-language summary.
//!
//! First of the two generation stages. The function is a pure
//! request/response unit: it borrows its input, touches no shared state,
//! and reports its outcome with telemetry attached. Committing the result
//! to the run is the orchestrator's job, which is what lets a superseded
//! run's answer be discarded without unwinding anything here.

use crate::backend::{GenerationBackend, TemplateId};
use crate::error::{DigestError, Stage};
use crate::output::StageOutcome;
use crate::pipeline::encode::EncodedPayload;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Input contract of the summarization stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizationRequest {
    /// The document as a base64 data URI. Must carry data.
    pub pdf_data_uri: EncodedPayload,
}

/// Output contract of the summarization stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizationResult {
    /// Summary of the document. Guaranteed non-blank on success.
    pub summary: String,
}

/// Run the summarization stage once.
///
/// An empty payload is rejected before any backend call. A response missing
/// a non-blank `summary` field is a contract violation, never a valid empty
/// result. Failures are terminal: there is no retry.
pub async fn summarize(
    backend: &dyn GenerationBackend,
    request: &SummarizationRequest,
) -> Result<StageOutcome<SummarizationResult>, DigestError> {
    if request.pdf_data_uri.is_empty() {
        return Err(DigestError::EmptyPayload);
    }

    let input = serde_json::to_value(request).map_err(|e| DigestError::Precondition {
        detail: format!("summarization request is not serialisable: {e}"),
    })?;

    let started = Instant::now();
    let reply = backend
        .generate(TemplateId::PdfSummarization, input)
        .await
        .map_err(|e| e.into_digest(Stage::Summarization))?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let result: SummarizationResult =
        serde_json::from_value(reply.output).map_err(|e| DigestError::Contract {
            stage: Stage::Summarization,
            detail: format!("missing or invalid summary field: {e}"),
        })?;

    if result.summary.trim().is_empty() {
        return Err(DigestError::Contract {
            stage: Stage::Summarization,
            detail: "summary field is blank".into(),
        });
    }

    debug!(
        duration_ms,
        tokens = reply.usage.total_tokens,
        "Summarization stage produced {} chars",
        result.summary.len()
    );

    Ok(StageOutcome {
        value: result,
        usage: reply.usage,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerationReply;
    use crate::error::BackendError;
    use crate::output::TokenUsage;
    use crate::pipeline::encode;
    use crate::pipeline::input::PDF_MEDIA_TYPE;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Returns the same structured output for every call.
    struct FixedBackend(Value);

    #[async_trait]
    impl GenerationBackend for FixedBackend {
        async fn generate(
            &self,
            _template: TemplateId,
            _input: Value,
        ) -> Result<GenerationReply, BackendError> {
            Ok(GenerationReply {
                output: self.0.clone(),
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                    total_tokens: 120,
                },
            })
        }
    }

    /// Fails the test if the pipeline reaches the backend at all.
    struct UnreachableBackend;

    #[async_trait]
    impl GenerationBackend for UnreachableBackend {
        async fn generate(
            &self,
            _template: TemplateId,
            _input: Value,
        ) -> Result<GenerationReply, BackendError> {
            panic!("backend must not be called");
        }
    }

    fn request_for(bytes: &[u8]) -> SummarizationRequest {
        SummarizationRequest {
            pdf_data_uri: encode::encode_bytes(PDF_MEDIA_TYPE, bytes),
        }
    }

    #[tokio::test]
    async fn valid_summary_comes_back_with_usage() {
        let backend = FixedBackend(json!({ "summary": "Tides are periodic." }));
        let outcome = summarize(&backend, &request_for(b"%PDF-1.7 x")).await.unwrap();
        assert_eq!(outcome.value.summary, "Tides are periodic.");
        assert_eq!(outcome.usage.total_tokens, 120);
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_before_the_backend() {
        let err = summarize(&UnreachableBackend, &request_for(b"")).await.unwrap_err();
        assert!(matches!(err, DigestError::EmptyPayload));
    }

    #[tokio::test]
    async fn missing_summary_field_is_a_contract_violation() {
        let backend = FixedBackend(json!({ "headline": "wrong shape" }));
        let err = summarize(&backend, &request_for(b"%PDF-1.7 x")).await.unwrap_err();
        assert!(matches!(
            err,
            DigestError::Contract {
                stage: Stage::Summarization,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn blank_summary_is_a_contract_violation() {
        let backend = FixedBackend(json!({ "summary": "  \n " }));
        let err = summarize(&backend, &request_for(b"%PDF-1.7 x")).await.unwrap_err();
        assert!(matches!(err, DigestError::Contract { .. }));
    }

    #[tokio::test]
    async fn backend_fault_carries_stage_context() {
        struct FailingBackend;

        #[async_trait]
        impl GenerationBackend for FailingBackend {
            async fn generate(
                &self,
                _template: TemplateId,
                _input: Value,
            ) -> Result<GenerationReply, BackendError> {
                Err(BackendError::Timeout { secs: 120 })
            }
        }

        let err = summarize(&FailingBackend, &request_for(b"%PDF-1.7 x")).await.unwrap_err();
        assert!(matches!(
            err,
            DigestError::Backend {
                stage: Stage::Summarization,
                ..
            }
        ));
    }

    #[test]
    fn request_serialises_with_the_wire_field_name() {
        let value = serde_json::to_value(request_for(b"%PDF")).unwrap();
        assert!(value.get("pdfDataUri").is_some());
    }
}
