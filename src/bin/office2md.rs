//! CLI binary for office2md.
//!
//! A thin shim over the library crate: maps CLI flags to `ConverterConfig`,
//! `WatchConfig` and the default backends, then runs a batch, a watch
//! session, or a protection check.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use office2md::backend::pdfium::PdfiumInspector;
use office2md::config::{OfficeRendererConfig, VisionConfig};
use office2md::{
    Backends, BatchOrchestrator, BatchSummary, ChangeKind, ConversionPipeline, ConversionReporter,
    ConversionTask, ConverterConfig, ProtectionDetector, ReporterHandle, TaskStatus, WatchConfig,
    WatchLoop, WatchedChange,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI reporter using indicatif ─────────────────────────────────────────────

/// Terminal reporter: one line per finished file, plus a progress bar during
/// batch runs.
struct CliReporter {
    bar: Option<ProgressBar>,
}

impl CliReporter {
    fn new(show_bar: bool) -> Arc<Self> {
        let bar = show_bar.then(|| {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}  {msg:.dim}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.set_prefix("Converting");
            bar
        });
        Arc::new(Self { bar })
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }
}

impl ConversionReporter for CliReporter {
    fn on_task_start(&self, input: &Path) {
        if let Some(bar) = &self.bar {
            bar.set_message(input.display().to_string());
        }
    }

    fn on_task_complete(&self, task: &ConversionTask) {
        let (icon, detail) = match task.status {
            TaskStatus::Completed => (
                green("✓"),
                task.output_file
                    .as_deref()
                    .map(|p| dim(&p.display().to_string()))
                    .unwrap_or_default(),
            ),
            TaskStatus::Warning => (
                yellow("⚠"),
                yellow(task.error_message.as_deref().unwrap_or("")),
            ),
            TaskStatus::Skipped => (dim("–"), dim(task.error_message.as_deref().unwrap_or(""))),
            _ => (red("✗"), red(task.error_message.as_deref().unwrap_or(""))),
        };
        let elapsed = task
            .duration_ms()
            .map(|ms| dim(&format!("{:.1}s", ms as f64 / 1000.0)))
            .unwrap_or_default();
        self.println(format!("  {icon} {:<40}  {elapsed}  {detail}", task.file_name()));
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_batch_start(&self, total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(total as u64);
            bar.enable_steady_tick(Duration::from_millis(80));
        }
    }

    fn on_batch_complete(&self, _summary: &BatchSummary) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    fn on_change_detected(&self, change: &WatchedChange) {
        if matches!(change.kind, ChangeKind::Deleted | ChangeKind::Renamed) {
            self.println(format!(
                "  {} {} {}",
                dim("·"),
                change.path.display(),
                dim(&change.kind.to_string())
            ));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every Office file in ./input to ./output
  office2md

  # Convert specific files
  office2md report.docx budget.xlsx -o markdown/

  # Watch a folder and convert files as they are saved
  office2md --watch --input-dir inbox --output-dir markdown

  # Check whether a PDF is rights-managed (no API key needed)
  office2md --inspect secure.pdf

  # JSON batch summary
  office2md --json > summary.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override the log filter

REQUIREMENTS:
  LibreOffice (soffice or libreoffice on PATH) renders Office files to PDF.
  A pdfium shared library must be loadable by the process (system library
  path or next to the binary).
"#;

/// Convert Office documents to Markdown through a PDF stage.
#[derive(Parser, Debug)]
#[command(
    name = "office2md",
    version,
    about = "Convert Word, Excel and PowerPoint files to Markdown",
    long_about = "Convert Office documents to Markdown: each file is rendered to PDF with \
LibreOffice, checked for rights-management protection, and transcribed page by page by a \
Vision Language Model. Runs once over a set of files or keeps watching a folder.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Office files to convert. Defaults to every Office file in --input-dir.
    inputs: Vec<PathBuf>,

    /// Folder scanned (batch) or watched (--watch).
    #[arg(short, long, env = "OFFICE2MD_INPUT_DIR", default_value = "input")]
    input_dir: PathBuf,

    /// Folder that receives the Markdown files.
    #[arg(short, long, env = "OFFICE2MD_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Working area for intermediate PDFs. Default: <system temp>/office_converter.
    #[arg(long, env = "OFFICE2MD_INTERMEDIATE_DIR")]
    intermediate_dir: Option<PathBuf>,

    /// Keep running and convert files as they change in --input-dir.
    #[arg(short, long, env = "OFFICE2MD_WATCH")]
    watch: bool,

    /// Include subfolders of --input-dir.
    #[arg(short, long, env = "OFFICE2MD_RECURSIVE")]
    recursive: bool,

    /// Quiet period before a changed file is converted.
    #[arg(long, env = "OFFICE2MD_DEBOUNCE_SECS", default_value_t = 2.0)]
    debounce_secs: f64,

    /// Minimum time between two conversions of the same file.
    #[arg(long, env = "OFFICE2MD_COOLDOWN_SECS", default_value_t = 10.0)]
    cooldown_secs: f64,

    /// Files converted at once in batch mode.
    #[arg(short, long, env = "OFFICE2MD_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Ask for plain text instead of structured Markdown.
    #[arg(long, env = "OFFICE2MD_PLAIN")]
    plain: bool,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Concurrent VLM calls per document.
    #[arg(long, env = "OFFICE2MD_VLM_CONCURRENCY", default_value_t = 5)]
    vlm_concurrency: usize,

    /// Max LLM output tokens per page.
    #[arg(long, env = "OFFICE2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "OFFICE2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per page on LLM failure.
    #[arg(long, env = "OFFICE2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Timeout for one LibreOffice render, in seconds.
    #[arg(long, env = "OFFICE2MD_RENDER_TIMEOUT", default_value_t = 300)]
    render_timeout: u64,

    /// Print whether this PDF is classified protected, then exit.
    #[arg(long, value_name = "PDF")]
    inspect: Option<PathBuf>,

    /// Print the batch summary (or inspect result) as JSON.
    #[arg(long, env = "OFFICE2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OFFICE2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OFFICE2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OFFICE2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
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

    let config = build_config(&cli)?;

    // ── Inspect mode ─────────────────────────────────────────────────────
    if let Some(ref pdf) = cli.inspect {
        let detector = ProtectionDetector::new(Arc::new(PdfiumInspector), &config);
        let protected = detector.is_protected(pdf).await;
        if cli.json {
            let value = serde_json::json!({ "file": pdf, "protected": protected });
            println!(
                "{}",
                serde_json::to_string_pretty(&value).context("Failed to serialise result")?
            );
        } else {
            println!("File:       {}", pdf.display());
            println!("Protected:  {}", protected);
        }
        return Ok(());
    }

    // ── Pipeline ─────────────────────────────────────────────────────────
    let backends = Backends::with_defaults(
        OfficeRendererConfig {
            timeout_secs: cli.render_timeout,
            ..Default::default()
        },
        build_vision_config(&cli),
    )
    .context("Failed to set up the Markdown renderer")?;

    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.watch;
    let reporter: ReporterHandle = CliReporter::new(show_progress);
    let pipeline = Arc::new(
        ConversionPipeline::new(config, backends)
            .context("Failed to prepare the working area")?
            .with_reporter(reporter),
    );

    if cli.watch {
        return run_watch(&cli, pipeline).await;
    }
    run_batch(&cli, pipeline).await
}

async fn run_batch(cli: &Cli, pipeline: Arc<ConversionPipeline>) -> Result<()> {
    let files = if cli.inputs.is_empty() {
        BatchOrchestrator::discover_inputs(&cli.input_dir, cli.recursive)
            .with_context(|| format!("Failed to list {}", cli.input_dir.display()))?
    } else {
        cli.inputs.clone()
    };

    if files.is_empty() && !cli.quiet && !cli.json {
        eprintln!("No Office files found in {}", bold(&cli.input_dir.display().to_string()));
    }

    let summary = BatchOrchestrator::new(pipeline)
        .run_batch(&files, &cli.output_dir)
        .await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        print_summary(&summary);
    }

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_watch(cli: &Cli, pipeline: Arc<ConversionPipeline>) -> Result<()> {
    let watch_config = WatchConfig::builder(&cli.input_dir, &cli.output_dir)
        .recursive(cli.recursive)
        .debounce(secs(cli.debounce_secs, "--debounce-secs")?)
        .cooldown(secs(cli.cooldown_secs, "--cooldown-secs")?)
        .build()
        .context("Invalid watch configuration")?;

    let watch = Arc::new(WatchLoop::new(watch_config, pipeline));
    let cancel = CancellationToken::new();

    watch
        .stop_on_signals(cancel.clone())
        .context("Failed to install signal handlers")?;

    if !cli.quiet {
        eprintln!(
            "{} watching {} → {}  (Ctrl-C to stop)",
            green("◆"),
            bold(&cli.input_dir.display().to_string()),
            bold(&cli.output_dir.display().to_string()),
        );
    }
    watch.run(cancel).await.context("Watch loop failed")?;
    Ok(())
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .batch_concurrency(cli.concurrency)
        .preserve_structure(!cli.plain);
    if let Some(ref dir) = cli.intermediate_dir {
        builder = builder.intermediate_dir(dir);
    }
    builder.build().context("Invalid configuration")
}

fn build_vision_config(cli: &Cli) -> VisionConfig {
    VisionConfig {
        model: cli.model.clone(),
        provider_name: cli.provider.clone(),
        temperature: cli.temperature,
        max_tokens: cli.max_tokens,
        max_retries: cli.max_retries,
        concurrency: cli.vlm_concurrency.max(1),
        ..Default::default()
    }
}

fn secs(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("{flag} must be a non-negative number"))
}

fn print_summary(summary: &BatchSummary) {
    let icon = if summary.failed > 0 {
        red("✘")
    } else if summary.warning > 0 {
        yellow("⚠")
    } else {
        green("✔")
    };
    eprintln!(
        "{icon} {} files: {} completed, {} failed, {} warning, {} skipped",
        bold(&summary.total.to_string()),
        green(&summary.completed.to_string()),
        red(&summary.failed.to_string()),
        yellow(&summary.warning.to_string()),
        dim(&summary.skipped.to_string()),
    );
    for task in summary.problem_files() {
        eprintln!(
            "   {} {}: {}",
            dim("·"),
            task.file_name(),
            task.error_message.as_deref().unwrap_or("")
        );
    }
}
