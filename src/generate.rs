//! Eager (whole-file) generation entry points.
//!
//! These wait for every record, then return the full [`GenerationOutput`].
//! Use [`crate::stream::generate_stream`] instead to receive outcomes one by
//! one as each record finishes.

use crate::config::GenerationConfig;
use crate::error::QrCardError;
use crate::output::{GenerationOutput, GenerationStats, RecordOutcome};
use crate::pipeline::encode::{encode_png, Encoders};
use crate::pipeline::fallback::encode_record;
use crate::pipeline::parse::{parse_records, FieldMapping, ParsedTable};
use crate::pipeline::payload::RecordPlan;
use crate::pipeline::input;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Generate one QR raster per CSV record.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(GenerationOutput)` once every record has been attempted, even if some
/// records failed (check `output.stats.failed` or each outcome's `succeeded`).
///
/// # Errors
/// Returns `Err(QrCardError)` only when the run cannot start:
/// - fewer than two non-blank lines ([`QrCardError::NoData`])
/// - no usable data rows ([`QrCardError::NoRecords`])
/// - no encoder available ([`QrCardError::EncoderUnavailable`])
///
/// # Example
/// ```rust,no_run
/// use csv2qr::{generate, GenerationConfig, OrganizationContext};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GenerationConfig::builder()
///     .organization(OrganizationContext::new("ACME", "", "acme.example"))
///     .build()?;
/// let output = generate("이름,휴대폰\n김철수,010-1234-5678\n", &config).await?;
/// for outcome in &output {
///     println!("{} → {}", outcome.display_name, outcome.suggested_filename());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn generate(
    csv_text: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QrCardError> {
    let total_start = Instant::now();

    // ── Step 1: Parse ────────────────────────────────────────────────────
    let table = parse_records(input::strip_bom(csv_text))?;

    // ── Step 2: Probe encoders ───────────────────────────────────────────
    let encoders = Encoders::resolve(config)?;

    // ── Step 3: Encode each record, in order ─────────────────────────────
    let total = table.records.len();
    info!("Generating QR codes for {} records", total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(total);
    }

    let mut outcomes = Vec::with_capacity(total);
    for (index, row) in table.records.iter().enumerate() {
        outcomes.push(process_record(index, row, total, &encoders, config).await);
    }

    // ── Step 4: Aggregate ────────────────────────────────────────────────
    let output = GenerationOutput::new(outcomes, total_start.elapsed().as_millis() as u64);
    info!(
        "Generation complete: {}/{} verified, {} fell back, {}ms total",
        output.stats.succeeded,
        output.stats.total_records,
        output.stats.fell_back,
        output.stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(total, output.stats.succeeded);
    }

    Ok(output)
}

/// Read a CSV file from disk and [`generate`] from it.
pub async fn generate_from_path(
    path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QrCardError> {
    let path = path.as_ref();
    info!("Reading {}", input::display_path(path).display());
    let text = input::read_input(path).await?;
    generate(&text, config).await
}

/// [`generate`] from raw bytes, e.g. an uploaded file. Bytes must be UTF-8;
/// a leading byte-order mark is ignored.
pub async fn generate_from_bytes(
    bytes: &[u8],
    config: &GenerationConfig,
) -> Result<GenerationOutput, QrCardError> {
    let text = input::decode_text(bytes.to_vec())?;
    generate(&text, config).await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    csv_text: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QrCardError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QrCardError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(csv_text, config))
}

/// Generate and write one PNG per record into `dir`.
///
/// Every record gets a file, placeholders included, named by
/// [`GenerationOutput::unique_filenames`]. Each file is written atomically
/// (temp file + rename) so an interrupted run never leaves a truncated PNG.
pub async fn generate_to_dir(
    csv_text: &str,
    dir: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationStats, QrCardError> {
    let output = generate(csv_text, config).await?;
    write_outputs(&output, dir.as_ref()).await?;
    Ok(output.stats)
}

/// Write every outcome of `output` into `dir`, returning the written paths in
/// input order.
pub async fn write_outputs(
    output: &GenerationOutput,
    dir: &Path,
) -> Result<Vec<PathBuf>, QrCardError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| QrCardError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(output.len());
    for (outcome, filename) in output.iter().zip(output.unique_filenames()) {
        let path = dir.join(filename);
        let png = outcome
            .to_png()
            .map_err(|e| QrCardError::Internal(format!("PNG encoding failed: {e}")))?;
        write_atomic(&path, &png).await?;
        debug!("Wrote {} ({} bytes)", path.display(), png.len());
        written.push(path);
    }

    info!("Wrote {} images to {}", written.len(), dir.display());
    Ok(written)
}

/// Parse the CSV without encoding anything.
///
/// Does not require an encoder. Useful to preview which headers and rows the
/// generator will see.
pub fn inspect(csv_text: &str) -> Result<ParsedTable, QrCardError> {
    parse_records(input::strip_bom(csv_text))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Plan and encode one record, firing progress events around it.
pub(crate) async fn process_record(
    index: usize,
    row: &FieldMapping,
    total: usize,
    encoders: &Encoders,
    config: &GenerationConfig,
) -> RecordOutcome {
    let record_num = index + 1;
    if let Some(ref cb) = config.progress_callback {
        cb.on_record_start(record_num, total);
    }

    let plan = RecordPlan::new(index, row, config);
    debug!(
        "Record {}/{} ({}): {} candidate payloads",
        record_num,
        total,
        plan.display_name,
        plan.payloads.len()
    );
    let outcome = encode_record(plan, encoders, config).await;

    if let Some(ref cb) = config.progress_callback {
        match &outcome.error {
            None => cb.on_record_complete(record_num, total, outcome.payload_used.len()),
            Some(e) => cb.on_record_failed(record_num, total, &e.to_string()),
        }
    }
    outcome
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), QrCardError> {
    let tmp_path = path.with_extension("png.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| QrCardError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| QrCardError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_parses_without_encoder() {
        let table = inspect("\u{FEFF}이름,이메일\n김철수,kim@x.com\n,\n").unwrap();
        assert_eq!(table.headers, vec!["이름", "이메일"]);
        assert_eq!(table.records.len(), 2);
        assert!(table.records[1].is_empty());
    }

    #[test]
    fn inspect_rejects_header_only() {
        assert!(matches!(
            inspect("이름,이메일\n"),
            Err(QrCardError::NoData { lines: 1 })
        ));
    }

    #[tokio::test]
    async fn bytes_must_be_utf8() {
        let err = generate_from_bytes(&[b'a', b'\n', 0xC0, 0x80], &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QrCardError::InvalidUtf8 { offset: 2 }));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = generate_from_path("/nonexistent/contacts.csv", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QrCardError::FileNotFound { .. }));
    }
}
