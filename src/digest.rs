//! Pipeline orchestration: the run lifecycle and its presentation surfaces.
//!
//! [`DigestPipeline`] owns the only mutable run aggregate. Callers interact
//! through the lifecycle operations (`select`, `submit`, `clear`) and read
//! through `snapshot`, `subscribe`, `updates`, or `wait`; the generation work
//! itself happens on a background task that commits transitions back into the
//! shared aggregate.
//!
//! ## Why replacement plus an id check instead of task cancellation?
//!
//! Selecting a new document while a run is in flight must not corrupt state,
//! but aborting the old task would leave an HTTP request mid-flight and
//! couple the orchestrator to backend internals. Instead `select` and
//! `submit` *replace* the aggregate under the lock with a fresh [`RunId`],
//! and every commit from a driving task is tagged with the id the task was
//! spawned for. A task that lost its run finds the id stale at its next
//! commit and stops on its own; its late results die quietly instead of
//! overwriting a newer run.
//!
//! Snapshots are broadcast on a watch channel *under the state lock*, so the
//! order observed by subscribers always matches commit order. Observer
//! callbacks run after the lock is released and may therefore trail a
//! supersession by one event.

use crate::backend::gemini::{GeminiBackend, API_KEY_ENV_VARS};
use crate::backend::GenerationBackend;
use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::observer::ObserverHandle;
use crate::output::DigestOutput;
use crate::pipeline::encode;
use crate::pipeline::input::{SourceDocument, PDF_MEDIA_TYPE};
use crate::pipeline::sentences::{self, KeySentenceRequest};
use crate::pipeline::summarize::{self, SummarizationRequest};
use crate::run::{PipelineRun, RunId, RunSnapshot, RunState};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// State shared between the pipeline handle and its driving tasks.
struct Shared {
    run: Mutex<PipelineRun>,
    next_id: AtomicU64,
    tx: watch::Sender<RunSnapshot>,
    observer: Option<ObserverHandle>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PipelineRun> {
        self.run.lock().expect("run state lock poisoned")
    }

    fn allocate(&self) -> RunId {
        RunId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Broadcast the current aggregate. Must be called with the lock held so
    /// watch order matches commit order.
    fn publish_locked(&self, run: &PipelineRun) -> RunSnapshot {
        let snapshot = run.snapshot();
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    fn notify(&self, f: impl FnOnce(&ObserverHandle)) {
        if let Some(ref observer) = self.observer {
            f(observer);
        }
    }

    fn notify_stage(&self, state: RunState) {
        self.notify(|observer| observer.on_stage_change(state));
    }

    /// Commit the transition to `next` for run `id` and broadcast it.
    ///
    /// Returns `None` when the run was superseded or already finished, in
    /// which case nothing is published and the caller must stop driving. A
    /// transition outside the legality table fails the run instead of
    /// committing; the caller sees the mismatch in the returned state.
    fn advance(
        &self,
        id: RunId,
        next: RunState,
        mutate: impl FnOnce(&mut PipelineRun),
    ) -> Option<RunSnapshot> {
        let (snapshot, precondition) = {
            let mut run = self.lock();
            if run.id != id {
                debug!(run = %id, "Dropping commit for a superseded run");
                return None;
            }
            if run.state.is_terminal() {
                debug!(run = %id, "Dropping commit for a finished run");
                return None;
            }
            if !run.state.can_advance(next) {
                let error = DigestError::Precondition {
                    detail: format!("illegal transition from {:?} to {next:?}", run.state),
                };
                run.state = RunState::Failed;
                run.error = Some(error.clone());
                (self.publish_locked(&run), Some(error))
            } else {
                run.state = next;
                mutate(&mut run);
                (self.publish_locked(&run), None)
            }
        };

        self.notify_stage(snapshot.state);
        if let Some(error) = precondition {
            warn!(run = %id, "Run failed: {error}");
            self.notify(|observer| observer.on_failure(error));
        }
        Some(snapshot)
    }

    /// Record a terminal failure for run `id`. A failure arriving after the
    /// run was superseded is dropped, not reported.
    fn fail(&self, id: RunId, error: DigestError) {
        let committed = self.advance(id, RunState::Failed, {
            let error = error.clone();
            move |run| run.error = Some(error)
        });
        if committed.is_some() {
            warn!(run = %id, "Run failed: {error}");
            self.notify(|observer| observer.on_failure(error));
        }
    }
}

/// Orchestrator for digesting one document at a time.
///
/// Cheap to clone: all mutable state lives behind a shared handle, so clones
/// observe and drive the same run, and `select`/`submit`/`snapshot` all take
/// `&self`.
///
/// # Example
/// ```rust,no_run
/// use pdfigest::{DigestConfig, DigestPipeline, RunState};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = DigestPipeline::new(DigestConfig::default());
/// pipeline.select_path("paper.pdf")?;
/// let id = pipeline.submit()?;
///
/// if let Some(done) = pipeline.wait(id).await {
///     match done.state {
///         RunState::Complete => println!("{}", done.summary.unwrap_or_default()),
///         _ => eprintln!("run failed: {:?}", done.error),
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DigestPipeline {
    config: DigestConfig,
    shared: Arc<Shared>,
}

impl DigestPipeline {
    /// Create a pipeline in the idle state.
    pub fn new(config: DigestConfig) -> Self {
        let initial = PipelineRun::idle(RunId::new(0));
        let (tx, _rx) = watch::channel(initial.snapshot());
        let shared = Arc::new(Shared {
            run: Mutex::new(initial),
            next_id: AtomicU64::new(1),
            tx,
            observer: config.observer.clone(),
        });
        DigestPipeline { config, shared }
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Select a document from the local filesystem.
    ///
    /// Validation happens here, synchronously: existence, readability, the
    /// `%PDF` magic, the declared media type, and the size cap. On success
    /// the current run — even one in flight — is replaced by a fresh
    /// `FileReady` run whose id is returned. On failure the current run is
    /// left untouched.
    pub fn select_path(&self, path: impl AsRef<Path>) -> Result<RunId, DigestError> {
        self.select(SourceDocument::from_path(path)?)
    }

    /// Select a document already held in memory.
    ///
    /// `media_type` is the caller's declaration and is validated like a file
    /// selection; bytes are not sniffed.
    pub fn select_bytes(
        &self,
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<RunId, DigestError> {
        self.select(SourceDocument::from_bytes(name, media_type, bytes))
    }

    fn select(&self, document: SourceDocument) -> Result<RunId, DigestError> {
        if !document.is_pdf() {
            return Err(DigestError::InvalidMediaType {
                declared: document.media_type().to_string(),
            });
        }
        if document.byte_len() > self.config.max_document_bytes {
            return Err(DigestError::DocumentTooLarge {
                bytes: document.byte_len(),
                limit: self.config.max_document_bytes,
            });
        }

        let id = self.shared.allocate();
        info!(
            run = %id,
            "Selected document: {} ({} bytes)",
            document.name(),
            document.byte_len()
        );

        let snapshot = {
            let mut run = self.shared.lock();
            *run = PipelineRun::ready(id, document);
            self.shared.publish_locked(&run)
        };
        self.shared.notify_stage(snapshot.state);
        Ok(id)
    }

    /// Submit the selected document for analysis.
    ///
    /// Rejected while a run is in flight ([`DigestError::RunInFlight`]) and
    /// when nothing is selected ([`DigestError::NoDocumentSelected`]); a
    /// finished run may be re-submitted, which analyses the same document
    /// again under a new id. The backend is resolved before any state
    /// changes, so a missing API key leaves the selection intact.
    ///
    /// Must be called from within a Tokio runtime; the run is driven on a
    /// background task and this call returns as soon as it is spawned.
    pub fn submit(&self) -> Result<RunId, DigestError> {
        let backend = self.resolve_backend()?;
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            DigestError::Precondition {
                detail: "submit requires a running tokio runtime".into(),
            }
        })?;

        let (id, document, snapshot) = {
            let mut run = self.shared.lock();
            if run.state.is_in_flight() {
                return Err(DigestError::RunInFlight);
            }
            let document = run.document.clone().ok_or(DigestError::NoDocumentSelected)?;
            let id = self.shared.allocate();
            let mut next = PipelineRun::ready(id, document.clone());
            next.state = RunState::Encoding;
            *run = next;
            (id, document, self.shared.publish_locked(&run))
        };
        self.shared.notify_stage(snapshot.state);

        info!(run = %id, "Submitted document: {}", document.name());
        handle.spawn(drive(Arc::clone(&self.shared), backend, id, document));
        Ok(id)
    }

    /// Discard the selection and any run, returning to idle under a new id.
    pub fn clear(&self) -> RunId {
        let id = self.shared.allocate();
        let snapshot = {
            let mut run = self.shared.lock();
            *run = PipelineRun::idle(id);
            self.shared.publish_locked(&run)
        };
        self.shared.notify_stage(snapshot.state);
        debug!(run = %id, "Cleared selection");
        id
    }

    /// The current run, as of now.
    pub fn snapshot(&self) -> RunSnapshot {
        self.shared.lock().snapshot()
    }

    /// Subscribe to run snapshots. The receiver holds the latest snapshot
    /// immediately; intermediate snapshots may be coalesced under load.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.shared.tx.subscribe()
    }

    /// The snapshot feed as a [`Stream`](futures::Stream), starting with the
    /// current snapshot. Convenient for `while let` UI loops.
    pub fn updates(&self) -> WatchStream<RunSnapshot> {
        WatchStream::new(self.shared.tx.subscribe())
    }

    /// Wait until run `id` reaches a terminal state.
    ///
    /// Returns `None` when the run was superseded before finishing; its
    /// outcome will never be known.
    pub async fn wait(&self, id: RunId) -> Option<RunSnapshot> {
        let mut rx = self.shared.tx.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.run_id != id {
                return None;
            }
            if snapshot.state.is_terminal() {
                return Some(snapshot);
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Resolve the generation backend, from most-specific to least-specific:
    ///
    /// 1. **Injected backend** (`config.backend`) — used as-is. The seam
    ///    tests use for scripted runs and hosts use to wrap the real backend
    ///    with middleware.
    /// 2. **Explicit API key** (`config.api_key`) — builds the Gemini
    ///    backend with the pipeline's generation parameters.
    /// 3. **Environment** — `GEMINI_API_KEY`, then `GOOGLE_API_KEY`.
    ///
    /// With nothing found, submission is rejected with a hint; the selected
    /// document stays valid, so providing a key does not cost a
    /// re-selection.
    fn resolve_backend(&self) -> Result<Arc<dyn GenerationBackend>, DigestError> {
        if let Some(ref backend) = self.config.backend {
            return Ok(Arc::clone(backend));
        }

        if let Some(ref key) = self.config.api_key {
            return Ok(Arc::new(GeminiBackend::new(key.clone(), &self.config)?));
        }

        for var in API_KEY_ENV_VARS {
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() {
                    debug!("Using API key from {var}");
                    return Ok(Arc::new(GeminiBackend::new(key, &self.config)?));
                }
            }
        }

        Err(DigestError::BackendNotConfigured {
            hint: "Set GEMINI_API_KEY or GOOGLE_API_KEY, pass an explicit api_key, \n\
                   or inject a backend via DigestConfigBuilder::backend."
                .to_string(),
        })
    }
}

/// Drive run `id` from `Encoding` to a terminal state.
///
/// Every commit goes through [`Shared::advance`] with the id this task was
/// spawned for; the task stops at the first commit that reports the run
/// superseded or failed.
async fn drive(
    shared: Arc<Shared>,
    backend: Arc<dyn GenerationBackend>,
    id: RunId,
    document: SourceDocument,
) {
    let total_start = Instant::now();

    // ── Encode ────────────────────────────────────────────────────────────
    let encode_start = Instant::now();
    let payload = match encode::encode_document(&document).await {
        Ok(payload) => payload,
        Err(e) => return shared.fail(id, e),
    };
    let encode_ms = encode_start.elapsed().as_millis() as u64;

    let Some(snapshot) = shared.advance(id, RunState::Summarizing, |run| {
        run.stats.encode_duration_ms = encode_ms;
    }) else {
        return;
    };
    if snapshot.state != RunState::Summarizing {
        return;
    }

    // ── Summarize ─────────────────────────────────────────────────────────
    let request = SummarizationRequest {
        pdf_data_uri: payload,
    };
    let outcome = match summarize::summarize(backend.as_ref(), &request).await {
        Ok(outcome) => outcome,
        Err(e) => return shared.fail(id, e),
    };
    let summary = outcome.value.summary;

    // The summary is committed together with the move into the second stage,
    // so subscribers can render it while extraction is still running.
    let Some(snapshot) = shared.advance(id, RunState::ExtractingKeySentences, |run| {
        run.summary = Some(summary.clone());
        run.stats.summarize_duration_ms = outcome.duration_ms;
        run.stats.record_usage(&outcome.usage);
    }) else {
        return;
    };
    if snapshot.state != RunState::ExtractingKeySentences {
        return;
    }
    shared.notify(|observer| observer.on_summary(summary.clone()));

    // ── Extract key sentences ─────────────────────────────────────────────
    let request = KeySentenceRequest {
        document_summary: summary,
    };
    let outcome = match sentences::extract_key_sentences(backend.as_ref(), &request).await {
        Ok(outcome) => outcome,
        Err(e) => return shared.fail(id, e),
    };
    let sentence_list = sentences::split_sentences(&outcome.value.key_sentences);

    let Some(snapshot) = shared.advance(id, RunState::Complete, |run| {
        run.key_sentences = Some(sentence_list.clone());
        run.stats.extract_duration_ms = outcome.duration_ms;
        run.stats.record_usage(&outcome.usage);
        run.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    }) else {
        return;
    };
    if snapshot.state == RunState::Complete {
        info!(
            run = %id,
            "Run complete: {} key sentences, {}ms total",
            sentence_list.len(),
            snapshot.stats.total_duration_ms
        );
        shared.notify(|observer| observer.on_key_sentences(sentence_list));
    }
}

// ── Eager entry points ────────────────────────────────────────────────────

/// Digest a PDF file in one call.
///
/// This is the primary entry point for hosts that do not need progressive
/// state: it selects, submits, and waits for the terminal snapshot.
///
/// # Arguments
/// * `path` — Local path to a PDF file
/// * `config` — Pipeline configuration
///
/// # Errors
/// Validation failures surface immediately; run failures surface after the
/// run reaches `Failed`, carrying the stage that produced them.
pub async fn digest(
    path: impl AsRef<Path>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    let pipeline = DigestPipeline::new(config.clone());
    pipeline.select_path(path)?;
    let id = pipeline.submit()?;
    finish(&pipeline, id).await
}

/// Digest PDF bytes already in memory.
///
/// `name` is only used for display and logging. The bytes are assumed to be
/// a PDF; size and emptiness are still validated.
///
/// # Example
/// ```rust,no_run
/// use pdfigest::{digest_bytes, DigestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("paper.pdf")?;
/// let output = digest_bytes("paper.pdf", bytes, &DigestConfig::default()).await?;
/// println!("{}", output.summary);
/// # Ok(())
/// # }
/// ```
pub async fn digest_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    let pipeline = DigestPipeline::new(config.clone());
    pipeline.select_bytes(name, PDF_MEDIA_TYPE, bytes)?;
    let id = pipeline.submit()?;
    finish(&pipeline, id).await
}

/// Synchronous wrapper around [`digest`].
///
/// Creates a temporary tokio runtime internally.
pub fn digest_sync(
    path: impl AsRef<Path>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DigestError::Precondition {
            detail: format!("failed to create async runtime: {e}"),
        })?
        .block_on(digest(path, config))
}

/// Wait for run `id` on a private pipeline and convert its terminal snapshot.
async fn finish(pipeline: &DigestPipeline, id: RunId) -> Result<DigestOutput, DigestError> {
    let snapshot = pipeline
        .wait(id)
        .await
        .ok_or_else(|| DigestError::Precondition {
            detail: "run was superseded before it finished".into(),
        })?;

    match snapshot.state {
        RunState::Complete => Ok(DigestOutput {
            summary: snapshot.summary.ok_or_else(|| DigestError::Precondition {
                detail: "completed run carries no summary".into(),
            })?,
            key_sentences: snapshot.key_sentences.unwrap_or_default(),
            stats: snapshot.stats,
        }),
        _ => Err(snapshot.error.unwrap_or(DigestError::Precondition {
            detail: "run failed without a recorded error".into(),
        })),
    }
}
