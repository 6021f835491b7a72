//! # csv2qr
//!
//! Turn a CSV contact list into one scannable vCard QR code per person.
//!
//! Each row becomes a ranked list of candidate payloads, from a full vCard
//! down to the bare name. The encoder walks that list until it gets a raster
//! that actually contains a QR symbol, so a long address or a third email
//! never costs someone their card: they get a smaller payload instead.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CSV
//!  │
//!  ├─ 1. Input     strict UTF-8, BOM stripped
//!  ├─ 2. Parse     header → value mappings, repeated headers merged
//!  ├─ 3. Fields    Korean/English synonym lookup, normalisation
//!  ├─ 4. Payloads  full vCard → minimal vCard → tel: → mailto: → name
//!  ├─ 5. Encode    fallback ladder over primary/secondary encoders
//!  ├─ 6. Verify    blank sample per attempt, pixel census at the end
//!  └─ 7. Output    one outcome per record, in input order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use csv2qr::{generate, GenerationConfig, OrganizationContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GenerationConfig::builder()
//!         .organization(OrganizationContext::new("ACME", "Seoul", "acme.example"))
//!         .build()?;
//!     let csv = std::fs::read_to_string("contacts.csv")?;
//!     let output = generate(&csv, &config).await?;
//!     for outcome in output.successful() {
//!         std::fs::write(outcome.suggested_filename(), outcome.to_png()?)?;
//!     }
//!     eprintln!("{}/{} verified", output.stats.succeeded, output.stats.total_records);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `csv2qr` binary (clap + anyhow + tracing-subscriber) |
//! | `builtin-encoder` | on | Built-in QR encoders backed by the `qrcode` crate |
//!
//! Without `builtin-encoder`, supply your own [`QrEncoder`] through
//! [`GenerationConfigBuilder::encoder`]:
//! ```toml
//! csv2qr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ErrorCorrectionLevel, ErrorCorrectionPolicy, GenerationConfig, GenerationConfigBuilder,
};
pub use error::{EncodeError, QrCardError, RecordError};
pub use generate::{
    generate, generate_from_bytes, generate_from_path, generate_sync, generate_to_dir, inspect,
    write_outputs,
};
pub use output::{GenerationOutput, GenerationStats, RecordOutcome, RecordSummary};
pub use pipeline::encode::{EncodeOptions, Encoders, QrEncoder};
#[cfg(feature = "builtin-encoder")]
pub use pipeline::encode::{CanvasEncoder, DataUrlEncoder};
pub use pipeline::fallback::AttemptStage;
pub use pipeline::parse::{FieldMapping, FieldValue, ParsedTable};
pub use pipeline::vcard::OrganizationContext;
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{generate_stream, OutcomeStream};
