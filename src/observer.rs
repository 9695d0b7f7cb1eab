//! Observer trait for run-transition events.
//!
//! Inject an [`Arc<dyn RunObserver>`] via
//! [`crate::config::DigestConfigBuilder::observer`] to receive real-time
//! events as a run moves through the pipeline.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a broadcast channel, a WebSocket, a database record, or a
//! terminal spinner — without the library knowing anything about how the host
//! application communicates. Hosts that prefer pull-style consumption can use
//! [`crate::digest::DigestPipeline::subscribe`] or
//! [`crate::digest::DigestPipeline::updates`] instead; both carry full
//! [`crate::run::RunSnapshot`]s.
//!
//! # Example
//!
//! ```rust
//! use pdfigest::{DigestConfig, RunObserver, RunState};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     transitions: Arc<AtomicUsize>,
//! }
//!
//! impl RunObserver for StageCounter {
//!     fn on_stage_change(&self, state: RunState) {
//!         self.transitions.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("pipeline is now: {}", state.describe());
//!     }
//! }
//!
//! let counter = Arc::new(StageCounter {
//!     transitions: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = DigestConfig::builder()
//!     .observer(counter as Arc<dyn RunObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::DigestError;
use crate::run::RunState;
use std::sync::Arc;

/// Called by the orchestrator as a run moves between states.
///
/// Implementations must be `Send + Sync` (the run is driven on a spawned
/// task). All methods have default no-op implementations so callers only
/// override what they care about.
///
/// # Event order
///
/// For every committed transition, [`on_stage_change`] fires first with the
/// new state; if the transition carries data, the matching data callback
/// ([`on_summary`], [`on_key_sentences`], or [`on_failure`]) fires directly
/// after it. The summary is therefore delivered before key-sentence
/// extraction starts. Parameters are owned so implementations stay `Send`
/// across task boundaries.
///
/// [`on_stage_change`]: RunObserver::on_stage_change
/// [`on_summary`]: RunObserver::on_summary
/// [`on_key_sentences`]: RunObserver::on_key_sentences
/// [`on_failure`]: RunObserver::on_failure
pub trait RunObserver: Send + Sync {
    /// Called for every committed state transition, including terminal ones.
    fn on_stage_change(&self, state: RunState) {
        let _ = state;
    }

    /// Called when the summarization stage commits its result, before the
    /// key-sentence stage begins.
    fn on_summary(&self, summary: String) {
        let _ = summary;
    }

    /// Called when the key-sentence stage commits. The list may be empty.
    fn on_key_sentences(&self, sentences: Vec<String>) {
        let _ = sentences;
    }

    /// Called when the run fails at any stage.
    fn on_failure(&self, error: DigestError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need run events.
///
/// This is the default when no observer is configured.
pub struct NoopRunObserver;

impl RunObserver for NoopRunObserver {}

/// Convenience alias matching the type stored in [`crate::config::DigestConfig`].
pub type ObserverHandle = Arc<dyn RunObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct TrackingObserver {
        stage_changes: Arc<AtomicUsize>,
        summaries: Arc<Mutex<Vec<String>>>,
        failures: Arc<AtomicUsize>,
    }

    impl RunObserver for TrackingObserver {
        fn on_stage_change(&self, _state: RunState) {
            self.stage_changes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_summary(&self, summary: String) {
            self.summaries.lock().unwrap().push(summary);
        }

        fn on_failure(&self, _error: DigestError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopRunObserver;
        obs.on_stage_change(RunState::Encoding);
        obs.on_summary("a summary".into());
        obs.on_key_sentences(vec!["one".into(), "two".into()]);
        obs.on_failure(DigestError::EmptyPayload);
    }

    #[test]
    fn tracking_observer_receives_events() {
        let tracker = TrackingObserver {
            stage_changes: Arc::new(AtomicUsize::new(0)),
            summaries: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(AtomicUsize::new(0)),
        };

        tracker.on_stage_change(RunState::Encoding);
        tracker.on_stage_change(RunState::Summarizing);
        tracker.on_summary("the gist".into());
        tracker.on_failure(DigestError::EmptyPayload);

        assert_eq!(tracker.stage_changes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.summaries.lock().unwrap().len(), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: Arc<dyn RunObserver> = Arc::new(NoopRunObserver);
        obs.on_stage_change(RunState::Complete);
        obs.on_key_sentences(Vec::new());
    }
}
