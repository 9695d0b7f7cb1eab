//! Key-sentence stage: committed summary → ordered sentence list.
//!
//! Second of the two generation stages, plus the deterministic splitting of
//! the model's newline-delimited answer into individual sentences.
//!
//! ## Why a regex delimiter?
//!
//! The template asks for sentences "separated by a newline character", but
//! models answer with `\n`, with `\r\n`, and occasionally with the literal
//! two-character escape `\n` left un-decoded inside the JSON string. All
//! three are the same authorial intent, so [`split_sentences`] treats them
//! uniformly; splitting on only one representation silently glues sentences
//! together for the others.

use crate::backend::{GenerationBackend, TemplateId};
use crate::error::{DigestError, Stage};
use crate::output::StageOutcome;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

static SENTENCE_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|\n|\\n").unwrap());

/// Input contract of the key-sentence stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySentenceRequest {
    /// The committed summary from the first stage. Must be non-blank.
    pub document_summary: String,
}

/// Output contract of the key-sentence stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySentenceResult {
    /// Zero or more sentences separated by newlines. An empty string is a
    /// legal result; a missing field is not.
    pub key_sentences: String,
}

/// Run the key-sentence stage once.
///
/// The stage is only ever invoked with a committed, non-blank summary;
/// anything else is an orchestrator defect and fails the run as a
/// precondition violation rather than reaching the backend.
pub async fn extract_key_sentences(
    backend: &dyn GenerationBackend,
    request: &KeySentenceRequest,
) -> Result<StageOutcome<KeySentenceResult>, DigestError> {
    if request.document_summary.trim().is_empty() {
        return Err(DigestError::Precondition {
            detail: "key-sentence stage invoked with an empty summary".into(),
        });
    }

    let input = serde_json::to_value(request).map_err(|e| DigestError::Precondition {
        detail: format!("key-sentence request is not serialisable: {e}"),
    })?;

    let started = Instant::now();
    let reply = backend
        .generate(TemplateId::KeySentenceExtraction, input)
        .await
        .map_err(|e| e.into_digest(Stage::KeySentences))?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let result: KeySentenceResult =
        serde_json::from_value(reply.output).map_err(|e| DigestError::Contract {
            stage: Stage::KeySentences,
            detail: format!("missing or invalid keySentences field: {e}"),
        })?;

    debug!(
        duration_ms,
        tokens = reply.usage.total_tokens,
        "Key-sentence stage produced {} chars",
        result.key_sentences.len()
    );

    Ok(StageOutcome {
        value: result,
        usage: reply.usage,
        duration_ms,
    })
}

/// Split newline-delimited sentence text into trimmed, non-blank sentences.
///
/// Backend ordering is preserved; blank lines and surrounding whitespace are
/// dropped. Whitespace-only input yields an empty list.
pub fn split_sentences(raw: &str) -> Vec<String> {
    SENTENCE_DELIMITER
        .split(raw)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerationReply;
    use crate::error::BackendError;
    use crate::output::TokenUsage;
    use async_trait::async_trait;
    use serde_json::{json, Value};

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
                usage: TokenUsage::default(),
            })
        }
    }

    fn request() -> KeySentenceRequest {
        KeySentenceRequest {
            document_summary: "The study finds tides are periodic. Moon drives them.".into(),
        }
    }

    #[test]
    fn splits_on_every_newline_representation() {
        let raw = "First point.\nSecond point.\r\nThird point.\\nFourth point.";
        assert_eq!(
            split_sentences(raw),
            vec![
                "First point.",
                "Second point.",
                "Third point.",
                "Fourth point."
            ]
        );
    }

    #[test]
    fn blank_lines_are_dropped_and_order_kept() {
        let raw = "Sentence one.\n\n   \nSentence two.\n";
        assert_eq!(split_sentences(raw), vec!["Sentence one.", "Sentence two."]);
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences(" \n\t \r\n ").is_empty());
        assert!(split_sentences("\\n\\n").is_empty());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(
            split_sentences("  padded sentence.  \n other one. "),
            vec!["padded sentence.", "other one."]
        );
    }

    #[tokio::test]
    async fn empty_sentence_text_is_a_legal_result() {
        let backend = FixedBackend(json!({ "keySentences": "" }));
        let outcome = extract_key_sentences(&backend, &request()).await.unwrap();
        assert_eq!(outcome.value.key_sentences, "");
        assert!(split_sentences(&outcome.value.key_sentences).is_empty());
    }

    #[tokio::test]
    async fn missing_field_is_a_contract_violation() {
        let backend = FixedBackend(json!({ "sentences": "wrong field" }));
        let err = extract_key_sentences(&backend, &request()).await.unwrap_err();
        assert!(matches!(
            err,
            DigestError::Contract {
                stage: Stage::KeySentences,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_summary_is_a_precondition_violation() {
        let backend = FixedBackend(json!({ "keySentences": "never reached" }));
        let err = extract_key_sentences(
            &backend,
            &KeySentenceRequest {
                document_summary: "   ".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DigestError::Precondition { .. }));
    }

    #[test]
    fn request_serialises_with_the_wire_field_name() {
        let value = serde_json::to_value(request()).unwrap();
        assert!(value.get("documentSummary").is_some());
    }
}
