//! End-to-end integration tests for pdfigest.
//!
//! These tests use a real PDF file in `./test_cases/` and make live Gemini
//! API calls.  They are gated behind the `E2E_ENABLED` environment variable
//! so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_digest_sample -- --nocapture

use futures::StreamExt;
use pdfigest::{
    digest, digest_bytes, DigestConfig, DigestError, DigestOutput, DigestPipeline, RunState,
    Stage,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

fn api_key_present() -> bool {
    std::env::var("GEMINI_API_KEY").is_ok() || std::env::var("GOOGLE_API_KEY").is_ok()
}

/// Skip this test if E2E_ENABLED is not set, no API key is set, *or* no PDF
/// file exists at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if !api_key_present() {
            println!("SKIP — set GEMINI_API_KEY or GOOGLE_API_KEY");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            println!("       Place any small PDF there first.");
            return;
        }
        p
    }};
}

/// Assert the digest output passes basic quality checks.
fn assert_digest_quality(output: &DigestOutput, context: &str) {
    assert!(
        !output.summary.trim().is_empty(),
        "[{context}] Summary is empty"
    );
    assert!(
        output.summary.len() >= 40,
        "[{context}] Summary suspiciously short: {} bytes",
        output.summary.len()
    );

    // Sentences arrive pre-split: no blank entries, no embedded newlines.
    for (i, sentence) in output.key_sentences.iter().enumerate() {
        assert!(
            !sentence.trim().is_empty(),
            "[{context}] Key sentence {i} is blank"
        );
        assert!(
            !sentence.contains('\n'),
            "[{context}] Key sentence {i} contains a raw newline: {sentence:?}"
        );
    }

    assert!(
        output.stats.total_input_tokens > 0,
        "[{context}] Should have consumed tokens"
    );
    assert!(
        output.stats.summarize_duration_ms > 0,
        "[{context}] Summarization duration was not recorded"
    );

    println!(
        "[{context}] ✓  {} summary bytes, {} key sentences, quality checks passed",
        output.summary.len(),
        output.key_sentences.len()
    );
}

// ── Eager API (needs Gemini API) ─────────────────────────────────────────────

/// Digest the sample PDF end to end and sanity-check both stages' output.
#[tokio::test]
async fn test_digest_sample_pdf() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let out_path = output_dir().join("sample_digest.md");

    let config = DigestConfig::builder().build().expect("valid config");

    let output = digest(&path, &config).await.expect("digest should succeed");

    assert_digest_quality(&output, "sample");
    assert!(
        !output.key_sentences.is_empty(),
        "A real document should yield at least one key sentence"
    );

    // Save result for human inspection.
    let mut rendered = format!("# Summary\n\n{}\n\n## Key Sentences\n\n", output.summary);
    for sentence in &output.key_sentences {
        rendered.push_str(&format!("- {sentence}\n"));
    }
    std::fs::write(&out_path, &rendered).ok();
    println!("[sample] Saved to {}", out_path.display());
    println!(
        "[sample] Tokens: {} in / {} out, {}ms total",
        output.stats.total_input_tokens,
        output.stats.total_output_tokens,
        output.stats.total_duration_ms
    );
    println!("--- BEGIN SUMMARY ---\n{}\n--- END SUMMARY ---", output.summary);
}

/// The bytes entrypoint must behave like the path entrypoint.
#[tokio::test]
async fn test_digest_from_bytes() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let bytes = std::fs::read(&path).expect("read PDF bytes");

    let config = DigestConfig::builder().build().expect("valid config");

    let output = digest_bytes("sample.pdf", bytes, &config)
        .await
        .expect("digest_bytes should succeed");

    assert_digest_quality(&output, "from-bytes");
}

/// A bad API key must fail the run with a backend error, not hang or panic.
#[tokio::test]
async fn test_invalid_key_fails_cleanly() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));

    let config = DigestConfig::builder()
        .api_key("invalid-key-for-testing")
        .build()
        .expect("valid config");

    let err = digest(&path, &config)
        .await
        .expect_err("an invalid key must be rejected");

    match err {
        DigestError::Backend { stage, detail } => {
            assert_eq!(stage, Stage::Summarization);
            println!("[invalid-key] rejected as expected: {detail}");
        }
        other => panic!("expected a backend error, got: {other:?}"),
    }
}

// ── Progressive API (needs Gemini API) ───────────────────────────────────────

/// Drive a run through the pipeline handle and watch it move forward.
///
/// Watch channels coalesce, so intermediate states may be skipped when the
/// subscriber is slow; the sequence must still be monotonic and terminal.
#[tokio::test]
async fn test_pipeline_updates_are_monotonic() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));

    fn rank(state: RunState) -> u8 {
        match state {
            RunState::Idle => 0,
            RunState::FileReady => 1,
            RunState::Encoding => 2,
            RunState::Summarizing => 3,
            RunState::ExtractingKeySentences => 4,
            RunState::Complete | RunState::Failed => 5,
        }
    }

    let config = DigestConfig::builder().build().expect("valid config");
    let pipeline = DigestPipeline::new(config);

    pipeline.select_path(&path).expect("selection should succeed");
    let mut updates = pipeline.updates();
    pipeline.submit().expect("submit should succeed");

    let mut seen = Vec::new();
    while let Some(snapshot) = updates.next().await {
        seen.push(snapshot.state);
        if snapshot.state.is_terminal() {
            break;
        }
    }

    println!("[updates] observed: {seen:?}");
    assert_eq!(*seen.last().unwrap(), RunState::Complete);
    for pair in seen.windows(2) {
        assert!(
            rank(pair[0]) <= rank(pair[1]),
            "states moved backwards: {seen:?}"
        );
    }

    let done = pipeline.snapshot();
    assert!(done.summary.is_some());
    assert!(done.key_sentences.is_some());
}
