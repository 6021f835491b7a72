//! CLI binary for csv2qr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig`, writes the PNGs and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use csv2qr::{
    generate, inspect, write_outputs, ErrorCorrectionLevel, ErrorCorrectionPolicy,
    GenerationConfig, GenerationProgressCallback, GenerationStats, OrganizationContext,
    ProgressCallback, RecordSummary,
};
use csv2qr::pipeline::input::{is_csv_path, read_input};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a live progress bar plus one log line per record.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-record wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner only until `on_generation_start` tells us the record count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading CSV…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            failures: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} records  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Encoding");
    }

    fn elapsed_secs(&self, record: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&record))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_records: usize) {
        self.activate_bar(total_records);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating {total_records} QR codes…"))
        ));
    }

    fn on_record_start(&self, record: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(record, Instant::now());
        }
        self.bar.set_message(format!("record {record}"));
    }

    fn on_record_complete(&self, record: usize, total: usize, payload_len: usize) {
        let secs = self.elapsed_secs(record);
        self.bar.println(format!(
            "  {} Record {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            record,
            total,
            dim(&format!("{payload_len:>5} bytes")),
            dim(&format!("{secs:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_record_failed(&self, record: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(record);
        self.failures.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Record {:>3}/{:<3}  {}  {}",
            red("✗"),
            record,
            total,
            red(&msg),
            dim(&format!("{secs:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_generation_complete(&self, total_records: usize, success_count: usize) {
        let failed = total_records.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} QR codes generated",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} QR codes verified  ({} failed)",
                if failed == total_records {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_records,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate into ./qr-codes
  csv2qr contacts.csv --org-name "남양인터내셔날"

  # Full organisation block, custom output directory
  csv2qr contacts.csv --org-name ACME --org-address "Seoul" \
      --org-website acme.example -o cards/

  # Larger images, adaptive error correction
  csv2qr contacts.csv --org-name ACME --size 600 --error-correction adaptive

  # Preview the parsed rows without encoding
  csv2qr --inspect-only contacts.csv --org-name ACME

  # Machine-readable summary
  csv2qr --json contacts.csv --org-name ACME > summary.json

RECOGNISED HEADERS (first non-empty synonym wins):
  name        이름, name, Name
  position    직책, position, Position, 직위
  phone       전화번호, phone, Phone, 핸드폰
  mobile      휴대폰, mobile, Mobile
  email       이메일, email, Email
  department  부서, department, Department

  Repeat a header (e.g. two "이메일" columns) to give a person several values.

ENVIRONMENT VARIABLES:
  CSV2QR_ORG_NAME, CSV2QR_ORG_ADDRESS, CSV2QR_ORG_WEBSITE, CSV2QR_OUTPUT,
  CSV2QR_SIZE, CSV2QR_ERROR_CORRECTION, CSV2QR_LEGACY_TIMEOUT_MS
  RUST_LOG    Overrides the log filter (e.g. RUST_LOG=csv2qr=debug)
"#;

/// Convert a CSV contact list into vCard QR code images.
#[derive(Parser, Debug)]
#[command(
    name = "csv2qr",
    version,
    about = "Convert a CSV contact list into vCard QR code images",
    long_about = "Reads a UTF-8 CSV of contacts (Korean or English headers) and writes one \
vCard QR code PNG per person. When a full vCard is too large to encode, smaller payloads \
are tried in turn so everyone still gets a scannable code.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// CSV file with a header row.
    input: PathBuf,

    /// Organisation name added to every card (required).
    #[arg(long, env = "CSV2QR_ORG_NAME")]
    org_name: String,

    /// Organisation address added to every full card.
    #[arg(long, env = "CSV2QR_ORG_ADDRESS", default_value = "")]
    org_address: String,

    /// Organisation website; `http://` is added when no scheme is given.
    #[arg(long, env = "CSV2QR_ORG_WEBSITE", default_value = "")]
    org_website: String,

    /// Directory the PNG files are written to.
    #[arg(short, long, env = "CSV2QR_OUTPUT", default_value = "qr-codes")]
    output: PathBuf,

    /// Image width and height in pixels (64–2048).
    #[arg(long, env = "CSV2QR_SIZE", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(64..=2048))]
    size: u32,

    /// Error-correction level: l, m, q, h, or adaptive.
    #[arg(long, env = "CSV2QR_ERROR_CORRECTION", value_enum, default_value = "l")]
    error_correction: EcArg,

    /// Timeout for the secondary encoder's image load, in milliseconds.
    #[arg(long, env = "CSV2QR_LEGACY_TIMEOUT_MS", default_value_t = 3000)]
    legacy_timeout: u64,

    /// Print a JSON summary (stats + per-record results) on stdout.
    #[arg(long, env = "CSV2QR_JSON")]
    json: bool,

    /// Parse the CSV and print the rows; no images are generated.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "CSV2QR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CSV2QR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CSV2QR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EcArg {
    L,
    M,
    Q,
    H,
    Adaptive,
}

impl From<EcArg> for ErrorCorrectionPolicy {
    fn from(v: EcArg) -> Self {
        match v {
            EcArg::L => ErrorCorrectionPolicy::Fixed(ErrorCorrectionLevel::L),
            EcArg::M => ErrorCorrectionPolicy::Fixed(ErrorCorrectionLevel::M),
            EcArg::Q => ErrorCorrectionPolicy::Fixed(ErrorCorrectionLevel::Q),
            EcArg::H => ErrorCorrectionPolicy::Fixed(ErrorCorrectionLevel::H),
            EcArg::Adaptive => ErrorCorrectionPolicy::Adaptive,
        }
    }
}

/// `--json` output.
#[derive(Serialize)]
struct JsonSummary {
    output_dir: PathBuf,
    stats: GenerationStats,
    records: Vec<RecordSummary>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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

    if !is_csv_path(&cli.input) {
        tracing::warn!(
            "{} does not have a .csv extension; parsing it as CSV anyway",
            cli.input.display()
        );
    }
    let text = read_input(&cli.input)
        .await
        .context("Failed to read CSV")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let table = inspect(&text).context("Failed to parse CSV")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&table).context("Failed to serialise table")?
            );
        } else {
            println!("File:      {}", cli.input.display());
            println!("Headers:   {}", table.headers.join(", "));
            println!("Records:   {}", table.records.len());
            for (i, row) in table.records.iter().enumerate() {
                let cells: Vec<String> = row
                    .iter()
                    .filter(|(_, v)| !v.is_empty())
                    .map(|(h, v)| format!("{h}={}", v.values().join("|")))
                    .collect();
                println!("  {:>3}. {}", i + 1, cells.join("  "));
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run generation ───────────────────────────────────────────────────
    let output = generate(&text, &config)
        .await
        .context("QR generation failed")?;
    let written = write_outputs(&output, &cli.output)
        .await
        .context("Failed to write QR images")?;
    let stats = &output.stats;

    if cli.json {
        let summary = JsonSummary {
            output_dir: cli.output.clone(),
            stats: stats.clone(),
            records: output.summaries(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Generated {}/{} QR codes in {}ms",
                stats.succeeded, stats.total_records, stats.total_duration_ms
            );
            for o in output.failed() {
                eprintln!(
                    "  {} {}: {}",
                    red("✗"),
                    o.display_name,
                    o.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                );
            }
        }
        eprintln!(
            "{}  {} files  {}ms  →  {}",
            if stats.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            written.len(),
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        if stats.fell_back > 0 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} records used a reduced payload",
                    stats.fell_back
                ))
            );
        }
    }

    if stats.succeeded == 0 {
        anyhow::bail!("No QR code could be verified ({} records)", stats.total_records);
    }
    Ok(())
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .organization(OrganizationContext::new(
            cli.org_name.as_str(),
            cli.org_address.as_str(),
            cli.org_website.as_str(),
        ))
        .require_organization(true)
        .raster_size(cli.size)
        .error_correction(cli.error_correction.into())
        .legacy_timeout_ms(cli.legacy_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

