//! Error types for the pdfigest library.
//!
//! Two distinct error types reflect two distinct vantage points:
//!
//! * [`DigestError`] — **Caller-facing**: everything a host or the CLI can
//!   observe, from synchronous rejections (wrong media type, nothing
//!   selected) to terminal run failures (contract violations, backend
//!   faults). Cloneable and serialisable so it travels inside
//!   [`crate::run::RunSnapshot`].
//!
//! * [`BackendError`] — **Transport-level**: what a
//!   [`crate::backend::GenerationBackend`] implementation reports (HTTP
//!   status, network fault, timeout, unparseable body). Stages map it into
//!   [`DigestError`] with their [`Stage`] tag attached, so the caller always
//!   sees which half of the pipeline failed.
//!
//! Every error is terminal for the run that produced it: there is no retry
//! loop. A failed run restarts only through a fresh submit.

use std::path::PathBuf;
use thiserror::Error;

/// The generation stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// First stage: encoded document → summary.
    Summarization,
    /// Second stage: summary → key sentences.
    KeySentences,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Summarization => f.write_str("summarization"),
            Stage::KeySentences => f.write_str("key-sentence extraction"),
        }
    }
}

/// All errors surfaced by the pdfigest library.
///
/// Validation variants are returned synchronously from `select`/`submit` and
/// never advance the run; the failure variants are recorded on the run that
/// produced them and broadcast with its final snapshot.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DigestError {
    // ── Validation errors (rejected before any backend call) ─────────────
    /// The selected file declares a media type other than `application/pdf`.
    #[error("Invalid file type '{declared}'. Only PDF files are accepted.")]
    InvalidMediaType { declared: String },

    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    DocumentNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The document exceeds the configured size cap.
    #[error(
        "Document is {bytes} bytes, above the {limit}-byte limit.\n\
         Raise max_document_bytes if your backend accepts larger payloads."
    )]
    DocumentTooLarge { bytes: u64, limit: u64 },

    /// The encoded payload carries no data.
    #[error("Encoded document is empty. Select a non-empty PDF file to analyze.")]
    EmptyPayload,

    /// `submit` was called before any document was accepted.
    #[error("No document selected. Select a PDF file to analyze first.")]
    NoDocumentSelected,

    /// `submit` was called while a run was still in flight.
    #[error(
        "A run is already in flight.\n\
         Wait for it to finish, or select a new document to supersede it."
    )]
    RunInFlight,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Run failures (terminal for the run that produced them) ────────────
    /// Reading or transforming the document into a payload failed.
    #[error("Failed to encode document: {detail}")]
    Encoding { detail: String },

    /// A backend response failed schema validation at a stage.
    #[error("Backend response violates the {stage} output contract: {detail}")]
    Contract { stage: Stage, detail: String },

    /// An internal invariant or execution precondition was broken (stage out
    /// of order, illegal transition, no async runtime). Fails the run rather
    /// than corrupting its state.
    #[error("Precondition violated: {detail}")]
    Precondition { detail: String },

    /// Transport, timeout, or backend-side failure during a stage.
    #[error("Generation failed during {stage}: {detail}")]
    Backend { stage: Stage, detail: String },

    // ── Construction errors ───────────────────────────────────────────────
    /// No backend handle and no API key could be resolved.
    #[error("No generation backend configured.\n{hint}")]
    BackendNotConfigured { hint: String },
}

/// Transport-level failures reported by a backend implementation.
///
/// Stages attach their [`Stage`] tag when mapping these into [`DigestError`]:
/// [`BackendError::Malformed`] becomes a contract violation, everything else
/// a backend fault.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service answered with a non-success HTTP status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Connection-level failure before any response arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// The call exceeded the configured timeout.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response body does not conform to the declared output schema.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Attach stage context, classifying malformed output as a contract
    /// violation and everything else as a backend fault.
    pub fn into_digest(self, stage: Stage) -> DigestError {
        match self {
            BackendError::Malformed(detail) => DigestError::Contract { stage, detail },
            other => DigestError::Backend {
                stage,
                detail: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_media_type_display() {
        let e = DigestError::InvalidMediaType {
            declared: "text/plain".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("text/plain"), "got: {msg}");
        assert!(msg.contains("Only PDF files are accepted"), "got: {msg}");
    }

    #[test]
    fn not_a_pdf_display() {
        let e = DigestError::NotAPdf {
            path: PathBuf::from("/tmp/fake.pdf"),
            magic: *b"<htm",
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/fake.pdf"), "got: {msg}");
        assert!(msg.contains("not a valid PDF"), "got: {msg}");
    }

    #[test]
    fn too_large_display() {
        let e = DigestError::DocumentTooLarge {
            bytes: 30_000_000,
            limit: 20_971_520,
        };
        assert!(e.to_string().contains("30000000"));
    }

    #[test]
    fn contract_display_carries_stage() {
        let e = DigestError::Contract {
            stage: Stage::KeySentences,
            detail: "missing keySentences field".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("key-sentence extraction"), "got: {msg}");
        assert!(msg.contains("missing keySentences field"), "got: {msg}");
    }

    #[test]
    fn backend_not_configured_display_carries_hint() {
        let e = DigestError::BackendNotConfigured {
            hint: "Set GEMINI_API_KEY or pass --api-key.".into(),
        };
        assert!(e.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn malformed_maps_to_contract() {
        let e = BackendError::Malformed("not JSON".into()).into_digest(Stage::Summarization);
        assert!(matches!(e, DigestError::Contract { stage: Stage::Summarization, .. }));
    }

    #[test]
    fn timeout_maps_to_backend_fault() {
        let e = BackendError::Timeout { secs: 120 }.into_digest(Stage::Summarization);
        match e {
            DigestError::Backend { stage, detail } => {
                assert_eq!(stage, Stage::Summarization);
                assert!(detail.contains("120s"), "got: {detail}");
            }
            other => panic!("expected Backend, got: {other:?}"),
        }
    }

    #[test]
    fn error_serialises_for_snapshots() {
        let e = DigestError::EmptyPayload;
        let json = serde_json::to_string(&e).unwrap();
        let back: DigestError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, DigestError::EmptyPayload));
    }
}
