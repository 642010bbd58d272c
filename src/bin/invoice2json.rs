//! CLI binary for invoice2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and reports progress. With no flags it reads
//! `./invoices` and writes `./extracted_invoices.json`.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice2json::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use invoice2json::{
    extract_batch, extract_file, BatchEntry, BatchProgressCallback, ExtractionConfig,
    ProgressCallback,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// invoice, printed above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the invoice currently being processed.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar length is set by `on_batch_start` once the directory is listed.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing invoices…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} invoices  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_documents} invoices…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, file_name: &str) {
        if let Ok(mut t) = self.started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(file_name.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, file_name: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            file_name,
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, file_name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            file_name,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} invoices extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} invoices extracted  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process ./invoices into ./extracted_invoices.json
  invoice2json

  # Another directory and output file
  invoice2json --input-dir scans/2024-01 --output out/january.json

  # A different model on another machine
  invoice2json --endpoint http://gpu-box:11434/api/chat --model llava:13b

  # One invoice, printed to stdout
  invoice2json --file invoices/Saskaita_208930951.pdf

  # Wait as long as the model needs
  invoice2json --timeout 0

OUTPUT:
  A JSON array with one entry per PDF, rewritten after every invoice:
    {"document": {invoice_id, ..., line_items, status, file_name, ...}}
    {"error": "...", "raw_response": ...}

ENVIRONMENT VARIABLES:
  INVOICE2JSON_INPUT_DIR  Directory scanned for *.pdf
  INVOICE2JSON_OUTPUT     Output JSON file
  OLLAMA_CHAT_URL         Chat endpoint URL
  INVOICE2JSON_MODEL      Vision model name
  INVOICE2JSON_TIMEOUT    Per-request timeout in seconds (0 = none)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. invoice2json=debug

SETUP:
  1. Start Ollama and pull the model:  ollama pull llama3.2-vision
  2. Put libpdfium next to the binary, or set PDFIUM_LIB_PATH
  3. Drop PDFs into ./invoices and run:  invoice2json
"#;

/// Extract structured data from PDF invoices with a local vision model.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2json",
    version,
    about = "Extract structured data from PDF invoices with a local vision model",
    long_about = "Render the first page of every PDF invoice in a directory, ask a vision model \
(Ollama llama3.2-vision by default) to read it, and normalise the answer into a fixed JSON \
record, even when the model's JSON is malformed.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory scanned (non-recursively) for *.pdf. Default: invoices
    #[arg(long, env = "INVOICE2JSON_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Output JSON file. Default: extracted_invoices.json (stdout with --file)
    #[arg(short, long, env = "INVOICE2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// Chat endpoint URL. Default: http://localhost:11434/api/chat
    #[arg(long, env = "OLLAMA_CHAT_URL")]
    endpoint: Option<String>,

    /// Vision model name. Default: llama3.2-vision
    #[arg(short, long, env = "INVOICE2JSON_MODEL")]
    model: Option<String>,

    /// Per-request timeout in seconds; 0 waits indefinitely.
    #[arg(long, env = "INVOICE2JSON_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout: u64,

    /// Path to libpdfium, or the directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Process a single PDF instead of a directory.
    #[arg(short, long, value_name = "PDF")]
    file: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "INVOICE2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar already shows one line per invoice.
    let show_progress = !cli.quiet && !cli.no_progress && cli.file.is_none();
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Single-invoice mode ──────────────────────────────────────────────
    if let Some(ref file) = cli.file {
        let entry = extract_file(file, &config)
            .await
            .with_context(|| format!("Failed to process {}", file.display()))?;
        return write_single(&cli, &entry).await;
    }

    // ── Batch mode ───────────────────────────────────────────────────────
    let start = Instant::now();
    let entries = extract_batch(&config)
        .await
        .context("Extraction failed")?;

    if !cli.quiet && !show_progress {
        let failed = entries.iter().filter(|e| e.is_error()).count();
        eprintln!(
            "Extracted {}/{} invoices in {:.1}s",
            entries.len() - failed,
            entries.len(),
            start.elapsed().as_secs_f64()
        );
    }
    if !cli.quiet {
        eprintln!(
            "   results saved to {}",
            bold(&config.output_path.display().to_string())
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let timeout = (cli.timeout > 0).then_some(cli.timeout);
    let mut builder = ExtractionConfig::builder().request_timeout_secs(timeout);

    if let Some(ref dir) = cli.input_dir {
        builder = builder.input_dir(dir);
    }
    // In single-invoice mode --output is the entry's destination, not the batch file.
    if let (Some(out), None) = (&cli.output, &cli.file) {
        builder = builder.output_path(out);
    }
    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Print the entry to stdout, or write it to `--output`.
async fn write_single(cli: &Cli, entry: &BatchEntry) -> Result<()> {
    let json = serde_json::to_string_pretty(entry).context("Failed to serialise result")?;

    match cli.output {
        Some(ref path) => {
            tokio::fs::write(path, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{json}").context("Failed to write to stdout")?;
        }
    }

    if let (Some(err), false) = (entry.error(), cli.quiet) {
        eprintln!("{} {}", red("✗"), err.error);
    }
    Ok(())
}
