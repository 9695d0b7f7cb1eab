//! Document input: accept a local file or in-memory bytes.
//!
//! ## Why declare the media type up front?
//!
//! Acceptance is decided on the *declared* type: a path input declares via
//! its extension, an in-memory input via its caller. The orchestrator
//! rejects anything that is not `application/pdf` before the pipeline does
//! any work. For path inputs declared as PDF we additionally sniff the
//! `%PDF` magic bytes, so a renamed JPEG fails here with a precise error
//! rather than as an opaque backend rejection after seconds of upload.

use crate::error::DigestError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The media type this pipeline accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Where a document's bytes live until encoding.
#[derive(Debug, Clone)]
pub(crate) enum DocumentBody {
    /// Bytes already in memory (host integrations, tests).
    Bytes(Vec<u8>),
    /// Local file read lazily at encode time.
    Path(PathBuf),
}

/// One selected document: display name, declared media type, content handle.
///
/// Owned by the orchestrator for the duration of one run and dropped when
/// the run is replaced; nothing is persisted.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    name: String,
    media_type: String,
    byte_len: u64,
    body: DocumentBody,
}

impl SourceDocument {
    /// Accept in-memory bytes with a caller-declared media type.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        SourceDocument {
            name: name.into(),
            media_type: media_type.into(),
            byte_len: bytes.len() as u64,
            body: DocumentBody::Bytes(bytes),
        }
    }

    /// Accept a local file, declaring the media type from its extension.
    ///
    /// Validates existence and read permission immediately and, for files
    /// declared as PDF, sniffs the `%PDF` magic. The bytes themselves are
    /// read later, at encode time.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DigestError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DigestError::DocumentNotFound {
                path: path.to_path_buf(),
            });
        }

        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        // Check read permission by attempting to open; sniff magic for PDFs.
        match std::fs::File::open(path) {
            Ok(mut f) => {
                if media_type == PDF_MEDIA_TYPE {
                    use std::io::Read;
                    let mut magic = [0u8; 4];
                    if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                        return Err(DigestError::NotAPdf {
                            path: path.to_path_buf(),
                            magic,
                        });
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(DigestError::PermissionDenied {
                    path: path.to_path_buf(),
                });
            }
            Err(_) => {
                return Err(DigestError::DocumentNotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        let byte_len = std::fs::metadata(path)
            .map(|m| m.len())
            .unwrap_or_default();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!(
            "Accepted local document: {} ({} bytes, {})",
            path.display(),
            byte_len,
            media_type
        );

        Ok(SourceDocument {
            name,
            media_type,
            byte_len,
            body: DocumentBody::Path(path.to_path_buf()),
        })
    }

    /// Display name (file name for path inputs).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared media type, e.g. `application/pdf`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Size of the document in bytes.
    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Whether the declared media type is the accepted PDF type.
    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }

    pub(crate) fn body(&self) -> &DocumentBody {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(suffix: &str, content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("create temp file");
        f.write_all(content).expect("write temp file");
        f
    }

    #[test]
    fn from_bytes_declares_what_the_caller_says() {
        let doc = SourceDocument::from_bytes("report.pdf", PDF_MEDIA_TYPE, b"%PDF-1.7".to_vec());
        assert_eq!(doc.name(), "report.pdf");
        assert_eq!(doc.byte_len(), 8);
        assert!(doc.is_pdf());
    }

    #[test]
    fn from_path_declares_pdf_from_extension() {
        let f = temp_file(".pdf", b"%PDF-1.4 content");
        let doc = SourceDocument::from_path(f.path()).unwrap();
        assert_eq!(doc.media_type(), PDF_MEDIA_TYPE);
        assert!(doc.is_pdf());
        assert_eq!(doc.byte_len(), 16);
        assert!(doc.name().ends_with(".pdf"));
    }

    #[test]
    fn from_path_declares_text_from_extension_without_sniffing() {
        let f = temp_file(".txt", b"just notes");
        let doc = SourceDocument::from_path(f.path()).unwrap();
        assert_eq!(doc.media_type(), "text/plain");
        assert!(!doc.is_pdf());
    }

    #[test]
    fn from_path_rejects_renamed_non_pdf() {
        let f = temp_file(".pdf", b"<html><body>hi</body></html>");
        let err = SourceDocument::from_path(f.path()).unwrap_err();
        match err {
            DigestError::NotAPdf { magic, .. } => assert_eq!(&magic, b"<htm"),
            other => panic!("expected NotAPdf, got: {other:?}"),
        }
    }

    #[test]
    fn from_path_rejects_missing_file() {
        let err = SourceDocument::from_path("/no/such/file.pdf").unwrap_err();
        assert!(matches!(err, DigestError::DocumentNotFound { .. }));
    }
}
