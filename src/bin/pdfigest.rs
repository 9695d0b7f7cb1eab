//! CLI binary for pdfigest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DigestConfig`, drives one run, and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfigest::{
    digest, DigestConfig, DigestError, DigestOutput, ObserverHandle, RunObserver, RunState,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Terminal run observer using indicatif ────────────────────────────────────

/// Spinner that follows the run through its stages and logs each committed
/// result above itself.
struct CliRunObserver {
    bar: ProgressBar,
}

impl CliRunObserver {
    fn spinner() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Digesting");
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RunObserver for CliRunObserver {
    fn on_stage_change(&self, state: RunState) {
        self.bar.set_message(state.describe().to_string());
    }

    fn on_summary(&self, summary: String) {
        self.bar.println(format!(
            "  {} summary ready  {}",
            green("✓"),
            dim(&format!("{} chars", summary.len()))
        ));
    }

    fn on_key_sentences(&self, sentences: Vec<String>) {
        self.bar.println(format!(
            "  {} {} key sentences",
            green("✓"),
            sentences.len()
        ));
    }

    fn on_failure(&self, error: DigestError) {
        // First line only; the full hint is printed with the final error.
        let msg = error.to_string();
        let msg = msg.lines().next().unwrap_or("analysis failed").to_string();
        self.bar.println(format!("  {} {}", red("✗"), red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digest to stdout
  pdfigest paper.pdf

  # Write the digest to a Markdown file
  pdfigest paper.pdf -o paper-digest.md

  # Structured JSON (summary, key sentences, stats)
  pdfigest --json paper.pdf > digest.json

  # Pick a model and raise the timeout for very large documents
  pdfigest --model gemini-2.5-pro --api-timeout 300 thesis.pdf

  # Quiet mode for scripts
  pdfigest -q paper.pdf -o digest.md

MODELS:
  Model               Input $/1M  Output $/1M  Notes
  ─────────────────   ──────────  ───────────  ──────────────────────────────
  gemini-2.0-flash    $0.10       $0.40        default; 20 MB inline PDFs
  gemini-2.5-flash    $0.30       $2.50        better long-document recall
  gemini-2.5-pro      $1.25       $10.00       highest fidelity, slow

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        Gemini API key (checked first)
  GOOGLE_API_KEY        Alternative key variable
  PDFIGEST_API_KEY      Explicit key for this tool only
  PDFIGEST_MODEL        Override model ID
  PDFIGEST_OUTPUT       Default output path
  PDFIGEST_API_TIMEOUT  Per-stage call timeout in seconds

SETUP:
  1. Set API key:  export GEMINI_API_KEY=...
  2. Digest:       pdfigest paper.pdf -o digest.md
"#;

/// Summarise a PDF and extract its key sentences.
#[derive(Parser, Debug)]
#[command(
    name = "pdfigest",
    version,
    about = "Summarise a PDF and extract its key sentences using Gemini",
    long_about = "Digest a PDF document into a faithful natural-language summary plus the key \
sentences that carry its substance. The document is sent inline to the Gemini generateContent \
API; no intermediate text extraction is performed.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: String,

    /// Write the digest to this file instead of stdout.
    #[arg(short, long, env = "PDFIGEST_OUTPUT")]
    output: Option<PathBuf>,

    /// Model ID (e.g. gemini-2.0-flash, gemini-2.5-pro).
    #[arg(
        long,
        env = "PDFIGEST_MODEL",
        long_help = "Gemini model to use. Default: gemini-2.0-flash ($0.10/$0.40 per 1M tokens).\n\
          Use gemini-2.5-pro for maximum fidelity on dense documents."
    )]
    model: Option<String>,

    /// Explicit API key (overrides GEMINI_API_KEY / GOOGLE_API_KEY).
    #[arg(long, env = "PDFIGEST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDFIGEST_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max model output tokens per stage.
    #[arg(long, env = "PDFIGEST_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Per-stage API call timeout in seconds.
    #[arg(long, env = "PDFIGEST_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Largest accepted document in bytes.
    #[arg(long, env = "PDFIGEST_MAX_BYTES", default_value_t = 20 * 1024 * 1024)]
    max_bytes: u64,

    /// Output structured JSON (summary, key sentences, stats) instead of Markdown.
    #[arg(long, env = "PDFIGEST_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDFIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFIGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the digest itself.
    #[arg(short, long, env = "PDFIGEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let observer = if show_progress {
        Some(CliRunObserver::spinner())
    } else {
        None
    };
    let config = build_config(&cli, observer.clone().map(|o| o as ObserverHandle))?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = digest(&cli.input, &config).await;

    // Clear the spinner before anything else writes to the terminal.
    if let Some(ref observer) = observer {
        observer.finish();
    }

    let output = result.context("Digest failed")?;

    // ── Print ────────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let contents = if cli.json {
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        } else {
            render_markdown(&output)
        };
        write_atomic(output_path, &contents)
            .await
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        if !cli.quiet {
            eprintln!(
                "{}  {}  {}ms  →  {}",
                green("✔"),
                bold(&cli.input),
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
            );
        }
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let rendered = render_markdown(&output);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;

        if !cli.quiet {
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {}ms total",
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `DigestConfig`.
fn build_config(cli: &Cli, observer: Option<ObserverHandle>) -> Result<DigestConfig> {
    let mut builder = DigestConfig::builder()
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .max_document_bytes(cli.max_bytes);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }

    builder.build().context("Invalid configuration")
}

/// Render the digest as a small Markdown document.
fn render_markdown(output: &DigestOutput) -> String {
    let mut doc = String::from("# Summary\n\n");
    doc.push_str(output.summary.trim());
    doc.push('\n');

    if !output.key_sentences.is_empty() {
        doc.push_str("\n## Key Sentences\n\n");
        for sentence in &output.key_sentences {
            doc.push_str("- ");
            doc.push_str(sentence);
            doc.push('\n');
        }
    }

    doc
}

/// Atomic write: temp file + rename so an interrupted run never leaves a
/// truncated digest behind.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .context("Failed to write temp file")?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .context("Failed to move temp file into place")?;
    Ok(())
}
