//! Run identity, state machine, and snapshots.
//!
//! A *run* is one end-to-end execution of the pipeline for a single selected
//! document. The aggregate lives in [`PipelineRun`]; which moves are legal is
//! decided by exactly one table, [`RunState::can_advance`], so the state
//! machine cannot drift apart from its documentation:
//!
//! ```text
//! Idle ──select──▶ FileReady ──submit──▶ Encoding ──▶ Summarizing
//!                                                          │
//!                            ExtractingKeySentences ◀──────┘
//!                                      │
//!                  Complete ◀──────────┘        (any in-flight ──▶ Failed)
//! ```
//!
//! `select` and `submit` never advance a run; they *replace* it with a fresh
//! aggregate carrying a higher [`RunId`]. A driving task tags every commit
//! with the id it was spawned for, so a task working for a replaced run finds
//! its id stale and lets its result die quietly.

use crate::error::DigestError;
use crate::output::DigestStats;
use crate::pipeline::input::SourceDocument;
use serde::{Deserialize, Serialize};

/// Monotonically increasing identity of one run.
///
/// Allocated whenever a document is selected or a run is submitted. Never
/// reused within a pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(u64);

impl RunId {
    pub(crate) fn new(value: u64) -> Self {
        RunId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No document selected yet, or the selection was cleared.
    Idle,
    /// A document passed validation and is ready to submit.
    FileReady,
    /// Reading the document and building the base64 payload.
    Encoding,
    /// First generation stage in flight.
    Summarizing,
    /// Summary committed; second generation stage in flight.
    ExtractingKeySentences,
    /// Both stages committed.
    Complete,
    /// A stage failed; the error is recorded on the run.
    Failed,
}

impl RunState {
    /// True while a driving task owns the run.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            RunState::Encoding | RunState::Summarizing | RunState::ExtractingKeySentences
        )
    }

    /// True once a run can no longer change on its own.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed)
    }

    /// Whether a driving task may advance a run from `self` to `next`.
    ///
    /// Covers only within-run edges; `select`/`submit` replace the run
    /// instead of advancing it. An advance outside this table is a
    /// precondition violation and fails the run.
    pub fn can_advance(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Encoding, Summarizing)
                | (Summarizing, ExtractingKeySentences)
                | (ExtractingKeySentences, Complete)
                | (Encoding, Failed)
                | (Summarizing, Failed)
                | (ExtractingKeySentences, Failed)
        )
    }

    /// Human-readable progress line for this state.
    ///
    /// Wording follows the status sequence hosts are expected to show while
    /// a run progresses.
    pub fn describe(self) -> &'static str {
        match self {
            RunState::Idle => "waiting for a document",
            RunState::FileReady => "document ready",
            RunState::Encoding => "encoding document",
            RunState::Summarizing => "uploading and generating summary",
            RunState::ExtractingKeySentences => "summary ready, extracting key sentences",
            RunState::Complete => "analysis complete",
            RunState::Failed => "analysis failed",
        }
    }
}

/// Aggregate state of the current run.
///
/// Mutated only by the orchestrator under its state lock; everything the
/// presentation boundary sees is a [`RunSnapshot`] clone.
#[derive(Debug)]
pub struct PipelineRun {
    pub id: RunId,
    pub state: RunState,
    pub document: Option<SourceDocument>,
    /// Committed summary; set when summarization succeeds.
    pub summary: Option<String>,
    /// Committed key sentences; set when extraction succeeds.
    pub key_sentences: Option<Vec<String>>,
    /// Terminal error; set only when the run fails.
    pub error: Option<DigestError>,
    pub stats: DigestStats,
}

impl PipelineRun {
    /// Fresh aggregate with no document.
    pub(crate) fn idle(id: RunId) -> Self {
        PipelineRun {
            id,
            state: RunState::Idle,
            document: None,
            summary: None,
            key_sentences: None,
            error: None,
            stats: DigestStats::default(),
        }
    }

    /// Fresh aggregate for an accepted document.
    pub(crate) fn ready(id: RunId, document: SourceDocument) -> Self {
        let document_bytes = document.byte_len();
        PipelineRun {
            id,
            state: RunState::FileReady,
            document: Some(document),
            summary: None,
            key_sentences: None,
            error: None,
            stats: DigestStats {
                document_bytes,
                ..DigestStats::default()
            },
        }
    }

    /// Cloneable view for the presentation boundary.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.id,
            state: self.state,
            document: self.document.as_ref().map(|d| d.name().to_string()),
            summary: self.summary.clone(),
            key_sentences: self.key_sentences.clone(),
            error: self.error.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Cloneable, serialisable view of a [`PipelineRun`].
///
/// Broadcast on the pipeline's watch channel after every committed
/// transition, and printed by the CLI's `--json` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub state: RunState,
    /// Display name of the selected document, if any.
    pub document: Option<String>,
    /// Present from `ExtractingKeySentences` onward.
    pub summary: Option<String>,
    /// Present once `Complete`. May be an empty list.
    pub key_sentences: Option<Vec<String>>,
    /// Present only in `Failed`.
    pub error: Option<DigestError>,
    pub stats: DigestStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_advances_are_legal() {
        assert!(RunState::Encoding.can_advance(RunState::Summarizing));
        assert!(RunState::Summarizing.can_advance(RunState::ExtractingKeySentences));
        assert!(RunState::ExtractingKeySentences.can_advance(RunState::Complete));
    }

    #[test]
    fn every_in_flight_state_may_fail() {
        assert!(RunState::Encoding.can_advance(RunState::Failed));
        assert!(RunState::Summarizing.can_advance(RunState::Failed));
        assert!(RunState::ExtractingKeySentences.can_advance(RunState::Failed));
    }

    #[test]
    fn skipping_a_stage_is_illegal() {
        assert!(!RunState::Encoding.can_advance(RunState::ExtractingKeySentences));
        assert!(!RunState::Encoding.can_advance(RunState::Complete));
        assert!(!RunState::Summarizing.can_advance(RunState::Complete));
    }

    #[test]
    fn terminal_and_inert_states_never_advance() {
        for state in [RunState::Idle, RunState::FileReady, RunState::Complete, RunState::Failed] {
            assert!(!state.can_advance(RunState::Summarizing), "{state:?}");
            assert!(!state.can_advance(RunState::Failed), "{state:?}");
        }
    }

    #[test]
    fn in_flight_and_terminal_classification() {
        assert!(RunState::Summarizing.is_in_flight());
        assert!(!RunState::FileReady.is_in_flight());
        assert!(RunState::Complete.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::ExtractingKeySentences.is_terminal());
    }

    #[test]
    fn snapshot_reflects_the_aggregate() {
        let doc = SourceDocument::from_bytes("paper.pdf", "application/pdf", b"%PDF-1.7".to_vec());
        let mut run = PipelineRun::ready(RunId::new(7), doc);
        run.state = RunState::ExtractingKeySentences;
        run.summary = Some("A summary.".into());

        let snap = run.snapshot();
        assert_eq!(snap.run_id, RunId::new(7));
        assert_eq!(snap.state, RunState::ExtractingKeySentences);
        assert_eq!(snap.document.as_deref(), Some("paper.pdf"));
        assert_eq!(snap.summary.as_deref(), Some("A summary."));
        assert_eq!(snap.stats.document_bytes, 8);
        assert!(snap.key_sentences.is_none());
        assert!(snap.error.is_none());
    }

    #[test]
    fn run_state_serialises_snake_case() {
        let json = serde_json::to_string(&RunState::ExtractingKeySentences).unwrap();
        assert_eq!(json, "\"extracting_key_sentences\"");
    }

    #[test]
    fn run_id_display() {
        assert_eq!(RunId::new(3).to_string(), "run#3");
    }
}
