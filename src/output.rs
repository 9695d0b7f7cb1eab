//! Result types returned by the digest pipeline.

use serde::{Deserialize, Serialize};

/// Token usage reported by the generation backend for one stage call.
///
/// Backends that omit usage metadata report zeroes; statistics then simply
/// under-count rather than estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One stage's successful result plus its telemetry.
#[derive(Debug, Clone)]
pub struct StageOutcome<T> {
    /// The stage's validated output.
    pub value: T,
    /// Token usage for this single backend call.
    pub usage: TokenUsage,
    /// Wall-clock duration of the backend call.
    pub duration_ms: u64,
}

/// Aggregate statistics for one run.
///
/// Populated progressively as stages commit, so a snapshot taken mid-run
/// carries the durations of the stages completed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestStats {
    /// Size of the source document in bytes.
    pub document_bytes: u64,
    /// Milliseconds spent reading and encoding the document.
    pub encode_duration_ms: u64,
    /// Milliseconds spent in the summarization stage.
    pub summarize_duration_ms: u64,
    /// Milliseconds spent in the key-sentence stage.
    pub extract_duration_ms: u64,
    /// Wall-clock milliseconds from submit to the terminal state.
    pub total_duration_ms: u64,
    /// Prompt tokens across both stages.
    pub total_input_tokens: u64,
    /// Completion tokens across both stages.
    pub total_output_tokens: u64,
}

impl DigestStats {
    /// Fold one stage's token usage into the run totals.
    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.total_input_tokens += u64::from(usage.prompt_tokens);
        self.total_output_tokens += u64::from(usage.completion_tokens);
    }
}

/// Final result of fully digesting one document.
///
/// Returned by the eager [`crate::digest`](crate::digest()) helpers and
/// assembled from the terminal [`crate::run::RunSnapshot`] of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestOutput {
    /// Natural-language summary of the document. Never empty.
    pub summary: String,
    /// Key sentences distilled from the summary, backend order preserved.
    /// May be empty: a short document can legitimately yield none.
    pub key_sentences: Vec<String>,
    /// Statistics for the run that produced this output.
    pub stats: DigestStats,
}
