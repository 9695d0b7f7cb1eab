//! Configuration types for the digest pipeline.
//!
//! All pipeline behaviour is controlled through [`DigestConfig`], built via
//! its [`DigestConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across threads and to diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field. The
//! builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::backend::gemini::models;
use crate::backend::GenerationBackend;
use crate::error::DigestError;
use crate::observer::ObserverHandle;
use std::fmt;
use std::sync::Arc;

/// Configuration for digesting a document.
///
/// Built via [`DigestConfig::builder()`] or using
/// [`DigestConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfigest::DigestConfig;
///
/// let config = DigestConfig::builder()
///     .model("gemini-2.5-flash")
///     .temperature(0.1)
///     .api_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Model identifier sent to the generation backend. Default: "gemini-2.0-flash".
    ///
    /// Flash-class models are the sweet spot for document digestion:
    /// summarising is a compression task, not a reasoning-heavy one, and the
    /// flash tier accepts the same inline PDF payloads at a fraction of the
    /// latency and cost of the pro tier.
    pub model: String,

    /// Explicit API key for the built-in Gemini backend.
    ///
    /// If None, backend resolution falls back to the `GEMINI_API_KEY` and
    /// `GOOGLE_API_KEY` environment variables, in that order.
    pub api_key: Option<String>,

    /// Pre-constructed generation backend. Takes precedence over `api_key`
    /// and the environment. This is the seam tests use to inject a scripted
    /// backend, and hosts use to wrap the real one with middleware.
    pub backend: Option<Arc<dyn GenerationBackend>>,

    /// Sampling temperature for both stages. Range: 0.0–2.0. Default: 0.2.
    ///
    /// Low temperature keeps the summary faithful to the document rather
    /// than creative. Raising it rarely helps a compression task.
    pub temperature: f32,

    /// Maximum tokens the model may generate per stage call. Default: 2048.
    ///
    /// A few-paragraph summary fits comfortably. Setting this too low
    /// truncates the summary mid-sentence, which then starves the
    /// key-sentence stage of material.
    pub max_output_tokens: usize,

    /// Per-stage-call timeout in seconds. Default: 120.
    ///
    /// Summarising a large PDF can take tens of seconds; the timeout guards
    /// against a hung connection, not against slow generation.
    pub api_timeout_secs: u64,

    /// Upper bound on accepted document size in bytes. Default: 20 MiB.
    ///
    /// Matches the inline-payload limit of the Gemini `generateContent`
    /// endpoint. Oversized documents are rejected at `select`, before any
    /// encoding work happens.
    pub max_document_bytes: u64,

    /// Observer receiving run-transition events. Default: None (no events).
    pub observer: Option<ObserverHandle>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            model: models::GEMINI_2_0_FLASH.to_string(),
            api_key: None,
            backend: None,
            temperature: 0.2,
            max_output_tokens: 2048,
            api_timeout_secs: 120,
            max_document_bytes: 20 * 1024 * 1024,
            observer: None,
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn GenerationBackend>"))
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn RunObserver>"))
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DigestConfig`].
#[derive(Debug)]
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl DigestConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_document_bytes(mut self, bytes: u64) -> Self {
        self.config.max_document_bytes = bytes;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(DigestError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DigestError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_document_bytes == 0 {
            return Err(DigestError::InvalidConfig(
                "Document size cap must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}
