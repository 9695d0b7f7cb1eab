//! Pipeline stages for distilling a PDF into a summary and key sentences.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ summarize ──▶ sentences
//! (file)   (data URI)  (stage 1)     (stage 2)
//! ```
//!
//! 1. [`input`]     — accept a local path or in-memory bytes as a
//!    [`input::SourceDocument`] with a declared media type
//! 2. [`encode`]    — read the bytes and wrap them in a base64 data URI
//! 3. [`summarize`] — first generation stage: payload → summary
//! 4. [`sentences`] — second generation stage: summary → key sentences
//!
//! Data flows strictly one way; the only value shared between the two
//! generation stages is the committed summary text.

pub mod encode;
pub mod input;
pub mod sentences;
pub mod summarize;
