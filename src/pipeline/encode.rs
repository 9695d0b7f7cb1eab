//! Payload encoding: document bytes → base64 data URI.
//!
//! The generation backend accepts documents as self-describing text, so the
//! encoder wraps raw bytes as `data:<media-type>;base64,<data>` — media type
//! and content in one string. Encoding is deterministic and lossless: the
//! same bytes always produce the same payload, and [`decode`] returns them
//! exactly. Validation belongs to the caller; by the time bytes arrive here
//! the document has already been accepted.

use crate::error::DigestError;
use crate::pipeline::input::{DocumentBody, SourceDocument};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A document encoded as a `data:<media-type>;base64,<data>` URI.
///
/// Construct via [`encode_bytes`] or [`encode_document`], which always
/// produce the well-formed shape. Values arriving through serde (snapshots,
/// scripted backends) are validated lazily by [`parts`](Self::parts) and
/// [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    /// The full data-URI string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(media_type, base64_data)`; `None` when the string is
    /// not a base64 data URI.
    pub fn parts(&self) -> Option<(&str, &str)> {
        self.0.strip_prefix("data:")?.split_once(";base64,")
    }

    /// True when the payload carries no data after its header.
    pub fn is_empty(&self) -> bool {
        self.parts().map_or(true, |(_, data)| data.is_empty())
    }
}

/// Wrap raw bytes in a data URI.
pub fn encode_bytes(media_type: &str, bytes: &[u8]) -> EncodedPayload {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} base64 chars", bytes.len(), b64.len());
    EncodedPayload(format!("data:{media_type};base64,{b64}"))
}

/// Encode a selected document, reading path-backed bodies from disk.
///
/// A read failure is an encoding error for the run; it is reported once and
/// never retried.
pub async fn encode_document(doc: &SourceDocument) -> Result<EncodedPayload, DigestError> {
    match doc.body() {
        DocumentBody::Bytes(bytes) => Ok(encode_bytes(doc.media_type(), bytes)),
        DocumentBody::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| DigestError::Encoding {
                detail: format!("failed to read '{}': {e}", path.display()),
            })?;
            Ok(encode_bytes(doc.media_type(), &bytes))
        }
    }
}

/// Recover `(media_type, bytes)` from a payload.
pub fn decode(payload: &EncodedPayload) -> Result<(String, Vec<u8>), DigestError> {
    let (media_type, data) = payload.parts().ok_or_else(|| DigestError::Encoding {
        detail: "payload is not a base64 data URI".into(),
    })?;
    let bytes = STANDARD.decode(data).map_err(|e| DigestError::Encoding {
        detail: format!("invalid base64 payload: {e}"),
    })?;
    Ok((media_type.to_string(), bytes))
}
