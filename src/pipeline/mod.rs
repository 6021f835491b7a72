//! Pipeline stages for CSV-to-QR generation.
//!
//! Each submodule implements one transformation step, so each can be tested
//! on its own and the encoder can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ parse ──▶ fields ──▶ payload ──▶ fallback ──▶ RecordOutcome
//! (UTF-8)   (rows)    (synonyms)  (ladder)   (encode + verify)
//!                        │            │           │
//!                    normalize      vcard     encode / verify
//! ```
//!
//! 1. [`input`]     — read the file or bytes, strict UTF-8, strip the BOM
//! 2. [`parse`]     — split lines into header → value mappings, merging
//!    repeated headers into sequences
//! 3. [`fields`]    — resolve logical fields through the synonym table
//! 4. [`normalize`] — whitespace and phone-number cleanup
//! 5. [`vcard`]     — full and minimal vCard 3.0 rendering
//! 6. [`payload`]   — the ranked candidate list for one record
//! 7. [`fallback`]  — walk the candidates until a raster verifies
//! 8. [`encode`]    — the [`encode::QrEncoder`] capability and built-ins
//! 9. [`verify`]    — blank sampling and the full pixel census

pub mod encode;
pub mod fallback;
pub mod fields;
pub mod input;
pub mod normalize;
pub mod parse;
pub mod payload;
pub mod vcard;
pub mod verify;
