//! Error types for the csv2qr library.
//!
//! Three error types reflect three distinct scopes of failure:
//!
//! * [`QrCardError`] — **Fatal**: the run cannot start at all (unreadable
//!   input, no data rows, no encoder available). Returned as
//!   `Err(QrCardError)` from the top-level `generate*` functions.
//!
//! * [`RecordError`] — **Non-fatal**: a single record could not be turned
//!   into a verified QR image. Stored inside
//!   [`crate::output::RecordOutcome`]; the run continues with the next row.
//!
//! * [`EncodeError`] — **Per attempt**: one candidate payload failed to
//!   encode. Recovered locally by the fallback ladder and only surfaced as
//!   the detail of a [`RecordError`] when every attempt failed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the csv2qr library.
///
/// Record-level failures use [`RecordError`] and are stored in
/// [`crate::output::RecordOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum QrCardError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("CSV file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input bytes are not valid UTF-8.
    #[error("Input is not valid UTF-8 (first bad byte at offset {offset})\nSave the CSV as UTF-8 and try again.")]
    InvalidUtf8 { offset: usize },

    /// Fewer than two non-blank lines: a header plus at least one data row is required.
    #[error("CSV has no data: a header row and at least one data row are required (found {lines} non-blank lines)")]
    NoData { lines: usize },

    /// A header was present but no data row produced a usable record.
    #[error("CSV has a header but no usable data rows")]
    NoRecords,

    // ── Encoder errors ────────────────────────────────────────────────────
    /// Neither a primary nor a secondary QR encoder is available.
    #[error(
        "No QR encoder is available.\n\
Enable the `builtin-encoder` feature or pass an encoder via GenerationConfig::builder().encoder(..)."
    )]
    EncoderUnavailable,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output image file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QrCardError {
    /// True for errors caused by the CSV content rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            QrCardError::InvalidUtf8 { .. } | QrCardError::NoData { .. } | QrCardError::NoRecords
        )
    }
}

/// A non-fatal error for a single record.
///
/// The record still occupies its slot in the output (with a placeholder
/// raster); only the `succeeded` flag and this error tell it apart.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RecordError {
    /// Every candidate payload, the second-chance encoder and the
    /// last-resort placeholder all failed to produce a raster.
    #[error("Record {record}: all {attempts} encode attempts failed: {detail}")]
    EncodeExhausted {
        record: usize,
        attempts: usize,
        detail: String,
    },

    /// A raster was produced but it is not a QR symbol (no dark or no light pixels).
    #[error("Record {record}: raster failed verification ({dark} dark / {light} light pixels)")]
    Unverified {
        record: usize,
        dark: u64,
        light: u64,
    },
}

/// A failed attempt to encode one payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The symbol generator rejected the payload (usually: data too long).
    #[error("QR symbol generation failed: {0}")]
    Symbol(String),

    /// The encoder reported success but the raster is uniformly blank.
    #[error("encoder produced a blank raster")]
    BlankRaster,

    /// The secondary encoder did not materialise its image in time.
    #[error("image materialisation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The secondary encoder's data URL could not be decoded into an image.
    #[error("image materialisation failed: {0}")]
    Materialize(String),

    /// Rasterisation itself failed (task panicked, bad dimensions).
    #[error("rasterisation failed: {0}")]
    Raster(String),
}
