//! # pdfigest
//!
//! Digest PDF documents into a summary and their key sentences using
//! generative models.
//!
//! ## Why this crate?
//!
//! Deciding whether a fifty-page document deserves an hour takes more than a
//! title. Classic extractive tooling (tf-idf sentence ranking, TextRank)
//! degrades badly on PDFs because layout noise leaks into the scoring.
//! Instead this crate ships the document itself to a multimodal model once,
//! distils it into a faithful summary, and then extracts the sentences that
//! carry its substance — all behind an explicit run state machine, so a host
//! can render progress truthfully and can never show results that belong to
//! a document the user already abandoned.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Select     validate media type, %PDF magic, size cap
//!  ├─ 2. Encode     bytes → base64 data URI
//!  ├─ 3. Summarize  Gemini generateContent (inline PDF → JSON summary)
//!  ├─ 4. Extract    summary → newline-separated key sentences
//!  └─ 5. Output     summary + ordered key sentences + run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfigest::{digest, DigestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let config = DigestConfig::default();
//!     let output = digest("paper.pdf", &config).await?;
//!     println!("{}", output.summary);
//!     for sentence in &output.key_sentences {
//!         println!("• {sentence}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Progressive runs
//!
//! Hosts that render progress drive the pipeline explicitly and watch its
//! snapshot feed; see [`DigestPipeline`] for the full lifecycle.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pdfigest::{DigestConfig, DigestPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = DigestPipeline::new(DigestConfig::default());
//!     pipeline.select_path("paper.pdf")?;
//!     pipeline.submit()?;
//!
//!     let mut updates = pipeline.updates();
//!     while let Some(snapshot) = updates.next().await {
//!         eprintln!("{}", snapshot.state.describe());
//!         if snapshot.state.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfigest` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdfigest = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Model
//!
//! | Model | $/1M tokens | Best for |
//! |-------|------------|----------|
//! | `gemini-2.0-flash` | $0.10/$0.40 | Default — fast, cheap, 20 MB inline PDFs |
//! | `gemini-2.5-flash` | $0.30/$2.50 | Long documents, better recall |
//! | `gemini-2.5-pro`   | $1.25/$10.00 | Maximum fidelity, slow |
//!
//! Summarising a typical paper costs well under **$0.01** with the default
//! model.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod digest;
pub mod error;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::gemini::GeminiBackend;
pub use backend::{GenerationBackend, GenerationReply, TemplateId};
pub use config::{DigestConfig, DigestConfigBuilder};
pub use digest::{digest, digest_bytes, digest_sync, DigestPipeline};
pub use error::{BackendError, DigestError, Stage};
pub use observer::{NoopRunObserver, ObserverHandle, RunObserver};
pub use output::{DigestOutput, DigestStats, StageOutcome, TokenUsage};
pub use pipeline::encode::EncodedPayload;
pub use pipeline::input::{SourceDocument, PDF_MEDIA_TYPE};
pub use run::{RunId, RunSnapshot, RunState};
