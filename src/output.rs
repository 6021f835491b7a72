//! Generation results: per-record outcomes and the run-level aggregate.
//!
//! Every input record gets exactly one [`RecordOutcome`], in input order,
//! whether or not its QR code verified. Failed records keep a placeholder
//! raster so packaging collaborators can still lay out one image per person.

use crate::error::RecordError;
use crate::pipeline::encode::encode_png;
use crate::pipeline::fallback::AttemptStage;
use image::RgbaImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Suffix appended to every suggested filename.
pub const FILENAME_SUFFIX: &str = "_QR코드.png";

static RE_FILENAME_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9가-힣]").unwrap());

/// The result of running one record through the pipeline.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    /// 0-based position in the input.
    pub index: usize,
    pub display_name: String,
    pub display_position: String,
    /// The accepted QR raster, or a placeholder when `succeeded` is false.
    pub raster: RgbaImage,
    /// Text actually encoded; when nothing verified, the last text attempted.
    pub payload_used: String,
    /// True only when the raster passed full verification.
    pub succeeded: bool,
    /// Ladder rung that produced `raster`; `None` if nothing was accepted.
    pub stage: Option<AttemptStage>,
    /// Encode calls made for this record.
    pub attempts: usize,
    /// The ranked candidate payloads, richest first.
    pub candidates: Vec<String>,
    pub error: Option<RecordError>,
}

impl RecordOutcome {
    /// Filename for this record's image: unsafe characters become `_`.
    pub fn suggested_filename(&self) -> String {
        suggested_filename(&self.display_name)
    }

    /// PNG bytes of the raster (placeholder included).
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        encode_png(&self.raster)
    }

    /// Serialisable view without the raster.
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            index: self.index,
            display_name: self.display_name.clone(),
            display_position: self.display_position.clone(),
            filename: self.suggested_filename(),
            payload_used: self.payload_used.clone(),
            succeeded: self.succeeded,
            stage: self.stage,
            attempts: self.attempts,
            error: self.error.clone(),
        }
    }
}

/// Raster-free, serialisable projection of a [`RecordOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub index: usize,
    pub display_name: String,
    pub display_position: String,
    pub filename: String,
    pub payload_used: String,
    pub succeeded: bool,
    pub stage: Option<AttemptStage>,
    pub attempts: usize,
    pub error: Option<RecordError>,
}

/// Filename for a display name: every char outside `[A-Za-z0-9가-힣]`
/// becomes `_`, then [`FILENAME_SUFFIX`] is appended.
pub fn suggested_filename(display_name: &str) -> String {
    format!(
        "{}{}",
        RE_FILENAME_UNSAFE.replace_all(display_name, "_"),
        FILENAME_SUFFIX
    )
}

/// Statistics about a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total_records: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records that needed more than their first candidate.
    pub fell_back: usize,
    pub total_duration_ms: u64,
}

/// All outcomes of a run, in input order.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    outcomes: Vec<RecordOutcome>,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// Assemble the aggregate; stats are derived from `outcomes`.
    pub fn new(outcomes: Vec<RecordOutcome>, total_duration_ms: u64) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
        let fell_back = outcomes
            .iter()
            .filter(|o| o.stage != Some(AttemptStage::Candidate(0)))
            .count();
        let stats = GenerationStats {
            total_records: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            fell_back,
            total_duration_ms,
        };
        Self { outcomes, stats }
    }

    pub fn get(&self, index: usize) -> Option<&RecordOutcome> {
        self.outcomes.get(index)
    }

    /// Single-item retrieval: only verified records are offered.
    pub fn downloadable(&self, index: usize) -> Option<&RecordOutcome> {
        self.get(index).filter(|o| o.succeeded)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter()
    }

    pub fn outcomes(&self) -> &[RecordOutcome] {
        &self.outcomes
    }

    pub fn successful(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn summaries(&self) -> Vec<RecordSummary> {
        self.outcomes.iter().map(RecordOutcome::summary).collect()
    }

    /// One filename per outcome, unique within the run: a repeated name gets
    /// `_2`, `_3`, … before the suffix.
    pub fn unique_filenames(&self) -> Vec<String> {
        let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        self.outcomes
            .iter()
            .map(|o| {
                let base = RE_FILENAME_UNSAFE
                    .replace_all(&o.display_name, "_")
                    .into_owned();
                let n = seen.entry(base.clone()).or_insert(0);
                *n += 1;
                if *n == 1 {
                    format!("{base}{FILENAME_SUFFIX}")
                } else {
                    format!("{base}_{n}{FILENAME_SUFFIX}")
                }
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a GenerationOutput {
    type Item = &'a RecordOutcome;
    type IntoIter = std::slice::Iter<'a, RecordOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}
