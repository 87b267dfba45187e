//! CLI binary for dua-overlay.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalyzerConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dua_overlay::{
    analyze, analyze_to_svg, retrain, AnalysisError, AnalysisStatus, AnalyzeOptions,
    AnalyzerConfig, FieldId, HighlightStyle, PageViewport, PollProgressCallback, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows one job from submission to its terminal status.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.set_message("Sending document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PollProgressCallback for CliProgressCallback {
    fn on_submitted(&self, operation_handle: &str) {
        self.bar.println(format!("{} {}", cyan("◆"), bold("Document submitted")));
        self.bar.println(format!("  {}", dim(operation_handle)));
        self.bar.set_prefix("Analysing");
        self.bar.set_message("waiting for first status…");
    }

    fn on_poll(&self, attempt: u32, status: AnalysisStatus) {
        self.bar.set_message(format!("poll #{attempt}: {status:?}"));
    }

    fn on_transport_retry(&self, attempt: u32, retry: u32, error: &str) {
        let msg = if error.len() > 80 {
            let cut = (0..=79).rev().find(|&i| error.is_char_boundary(i)).unwrap_or(0);
            format!("{}\u{2026}", &error[..cut])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} poll #{attempt} retry {retry}  {}",
            cyan("↻"),
            dim(&msg)
        ));
    }

    fn on_complete(&self, attempts: u32, succeeded: bool) {
        self.bar.finish_and_clear();
        if succeeded {
            eprintln!("{} analysis finished after {} polls", green("✔"), bold(&attempts.to_string()));
        } else {
            eprintln!("{} analysis ended after {} polls", red("✘"), bold(&attempts.to_string()));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Overlay the first page of a DUA as SVG
  dua-overlay analyze dua.pdf -o dua.svg

  # Same, with the rendered page underneath and one field emphasised
  dua-overlay analyze dua.pdf -o dua.svg --background --highlight Exporter

  # Structured JSON (fields, shapes, stats) to stdout
  dua-overlay analyze https://example.com/dua.pdf --json > dua.json

  # Map onto a fixed 800x1200 surface instead of the page's own size
  dua-overlay analyze dua.pdf --width 800 --height 1200 --json

  # Start a model build from corrected labels
  dua-overlay retrain --source "https://…/training?sv=…" --corrected-data fixes.json

ENVIRONMENT VARIABLES:
  DUA_ENDPOINT       Analysis service base URL
  DUA_API_KEY        Subscription key
  DUA_MODEL_ID       Custom model to analyse with
  DUA_API_VERSION    Service API version
  PDFIUM_LIB_PATH    Path to libpdfium (file or directory); system library otherwise
  RUST_LOG           Overrides the log filter chosen by -v / -q
"#;

/// Analyse customs PDFs and overlay the extracted fields.
#[derive(Parser, Debug)]
#[command(
    name = "dua-overlay",
    version,
    about = "Analyse customs PDFs and overlay the extracted fields",
    long_about = "Submit a DUA PDF to the document-analysis service, poll the operation until it \
finishes, and map every extracted field onto the page as a coloured, labelled rectangle.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DUA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DUA_QUIET")]
    quiet: bool,

    /// Print results and errors as JSON.
    #[arg(long, global = true, env = "DUA_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Analysis service base URL.
    #[arg(long, global = true, env = "DUA_ENDPOINT")]
    endpoint: Option<String>,

    /// Subscription key.
    #[arg(long, global = true, env = "DUA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model identifier.
    #[arg(long, global = true, env = "DUA_MODEL_ID")]
    model: Option<String>,

    /// Service API version.
    #[arg(long, global = true, env = "DUA_API_VERSION")]
    api_version: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "DUA_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse a PDF and render its field overlay.
    Analyze(AnalyzeArgs),
    /// Start a model build from corrected training data.
    Retrain(RetrainArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the SVG overlay to this file.
    #[arg(short, long, env = "DUA_OUTPUT")]
    output: Option<PathBuf>,

    /// 1-based page to overlay.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,

    /// Target surface width in pixels (defaults to the page width in points).
    #[arg(long, requires = "height")]
    width: Option<f64>,

    /// Target surface height in pixels (defaults to the page height in points).
    #[arg(long, requires = "width")]
    height: Option<f64>,

    /// Embed the rendered page under the overlay.
    #[arg(long)]
    background: bool,

    /// Field to emphasise in the SVG (`name` or `name#index`).
    #[arg(long)]
    highlight: Option<FieldId>,

    /// Seed for field colours, for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Wait between status polls in milliseconds.
    #[arg(long, env = "DUA_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Give up after this many status polls.
    #[arg(long, env = "DUA_MAX_ATTEMPTS", default_value_t = 150)]
    max_attempts: u32,

    /// Give up after this many seconds of polling.
    #[arg(long, env = "DUA_MAX_DURATION", default_value_t = 300)]
    max_duration: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "DUA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "DUA_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct RetrainArgs {
    /// Training container URL (with SAS token).
    #[arg(long, env = "DUA_TRAINING_SOURCE")]
    source: String,

    /// JSON file with corrected field values.
    #[arg(long)]
    corrected_data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless asked for.
    let show_progress = match &cli.command {
        Command::Analyze(a) => !cli.quiet && !a.no_progress && !cli.json,
        Command::Retrain(_) => false,
    };
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

    let outcome = match &cli.command {
        Command::Analyze(args) => run_analyze(&cli, args, show_progress).await,
        Command::Retrain(args) => run_retrain(&cli, args).await,
    };

    if let Err(err) = outcome {
        if cli.json {
            if let Some(e) = err.downcast_ref::<AnalysisError>() {
                eprintln!("{}", serde_json::to_string_pretty(&e.descriptor())?);
                std::process::exit(1);
            }
        }
        return Err(err);
    }
    Ok(())
}

async fn run_analyze(cli: &Cli, args: &AnalyzeArgs, show_progress: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PollProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, Some(args), progress)?;

    let options = AnalyzeOptions {
        viewport: match (args.width, args.height) {
            (Some(width), Some(height)) => Some(PageViewport { width, height }),
            _ => None,
        },
        color_seed: args.seed,
        background: args.background,
        highlight: args.highlight.clone(),
    };

    if let Some(ref output_path) = args.output {
        let stats = analyze_to_svg(&args.input, output_path, &config, &options).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else if !cli.quiet {
            eprintln!(
                "{}  {} fields  {} shapes  {}ms  →  {}",
                green("✔"),
                stats.field_count,
                stats.shape_count,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let output = analyze(&args.input, &config, &options).await?;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    for shape in &output.shapes {
        println!(
            "{:<32} {:>8.1} {:>8.1} {:>8.1} {:>8.1}  {}  {}",
            shape.field_id.to_string(),
            shape.left,
            shape.top,
            shape.width,
            shape.height,
            shape.color,
            shape.label,
        );
    }
    if !cli.quiet {
        eprintln!(
            "{} fields, {} shapes on a {:.0}x{:.0} surface in {}ms",
            output.stats.field_count,
            output.stats.shape_count,
            output.viewport.width,
            output.viewport.height,
            output.stats.total_duration_ms
        );
    }
    Ok(())
}

async fn run_retrain(cli: &Cli, args: &RetrainArgs) -> Result<()> {
    let config = build_config(cli, None, None)?;
    let corrected_data = match args.corrected_data {
        Some(ref path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read corrected data from {:?}", path))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Corrected data in {:?} is not valid JSON", path))?
        }
        None => serde_json::Value::Null,
    };

    let response = retrain(&args.source, corrected_data, &config).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Map CLI args to `AnalyzerConfig`.
fn build_config(
    cli: &Cli,
    analyze: Option<&AnalyzeArgs>,
    progress: Option<ProgressCallback>,
) -> Result<AnalyzerConfig> {
    let svc = &cli.service;
    let mut builder = AnalyzerConfig::builder()
        .request_timeout_secs(svc.request_timeout)
        .highlight(HighlightStyle::default());
    if let Some(ref v) = svc.endpoint {
        builder = builder.endpoint(v.trim_end_matches('/'));
    }
    if let Some(ref v) = svc.api_key {
        builder = builder.api_key(v);
    }
    if let Some(ref v) = svc.model {
        builder = builder.model_id(v);
    }
    if let Some(ref v) = svc.api_version {
        builder = builder.api_version(v);
    }
    if let Some(a) = analyze {
        builder = builder
            .page_index(a.page as usize - 1)
            .poll_interval_ms(a.poll_interval_ms)
            .max_attempts(a.max_attempts)
            .max_duration_secs(a.max_duration)
            .download_timeout_secs(a.download_timeout);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}
