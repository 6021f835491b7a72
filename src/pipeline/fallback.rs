//! Encode-with-fallback controller: one record's payload ladder → one raster.
//!
//! ```text
//! Trying(i) ──encode ok──▶ Verifying ──non-blank──▶ Succeeded
//!    │                        │
//!    └──encode err──▶ TryNext ◀──blank──┘
//!                        │
//!                   i+1 < n ? Trying(i+1) : AllExhausted
//!
//! AllExhausted ──▶ SecondChance (secondary encoder, simplest payload)
//!              ──▶ LastResort   (primary encoder, display name or placeholder)
//! ```
//!
//! Whatever raster is finally accepted gets a full pixel census; only a
//! raster with both dark and light pixels marks the record as succeeded.
//! Failures never escape this module: a record that cannot be encoded still
//! yields an outcome, carrying a blank placeholder raster and a
//! [`RecordError`].

use crate::config::GenerationConfig;
use crate::error::{EncodeError, RecordError};
use crate::output::RecordOutcome;
use crate::pipeline::encode::{EncodeOptions, Encoders, QrEncoder};
use crate::pipeline::payload::RecordPlan;
use crate::pipeline::verify::{blank_canvas, census, is_blank_sample};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which rung of the fallback ladder produced a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStage {
    /// Candidate `n` (0-based) of the payload list, primary encoder.
    Candidate(usize),
    /// Simplest candidate through the secondary encoder.
    SecondChance,
    /// The display name (or the placeholder) through the primary encoder.
    LastResort,
}

/// Result of one encode call plus its blank check.
#[derive(Debug)]
pub struct EncodeAttempt {
    pub payload: String,
    pub stage: AttemptStage,
    pub raster: Option<RgbaImage>,
    pub succeeded: bool,
    pub error: Option<EncodeError>,
}

/// Ladder state for the primary pass over the candidate list.
enum LadderState {
    Trying(usize),
    Verifying(usize, EncodeAttempt),
    TryNext(usize),
    Succeeded(EncodeAttempt),
    AllExhausted,
}

/// Run one record through the ladder. Never fails; see module docs.
pub async fn encode_record(
    plan: RecordPlan,
    encoders: &Encoders,
    config: &GenerationConfig,
) -> RecordOutcome {
    let mut attempts = 0usize;
    let mut last_error: Option<EncodeError> = None;
    let mut last_text = String::new();
    // Most recent raster seen, even a rejected one, kept as the placeholder.
    let mut last_raster: Option<RgbaImage> = None;

    // ── Primary ladder ───────────────────────────────────────────────────
    let mut state = LadderState::Trying(0);
    let accepted = loop {
        state = match state {
            LadderState::Trying(i) => match plan.payloads.get(i) {
                None => LadderState::AllExhausted,
                Some(payload) => {
                    attempts += 1;
                    last_text = payload.clone();
                    let attempt = encode_once(
                        encoders.primary.as_ref(),
                        payload,
                        AttemptStage::Candidate(i),
                        config,
                    )
                    .await;
                    if attempt.succeeded {
                        LadderState::Verifying(i, attempt)
                    } else {
                        absorb(attempt, &mut last_error, &mut last_raster);
                        LadderState::TryNext(i)
                    }
                }
            },
            LadderState::Verifying(i, attempt) => {
                let attempt = check_blank(attempt);
                if attempt.succeeded {
                    LadderState::Succeeded(attempt)
                } else {
                    absorb(attempt, &mut last_error, &mut last_raster);
                    LadderState::TryNext(i)
                }
            }
            LadderState::TryNext(i) => LadderState::Trying(i + 1),
            LadderState::Succeeded(attempt) => break Some(attempt),
            LadderState::AllExhausted => break None,
        };
    };

    // ── Second chance: simplest payload, secondary encoder ───────────────
    let accepted = match accepted {
        Some(a) => Some(a),
        None => match (&encoders.secondary, plan.payloads.last()) {
            (Some(secondary), Some(simplest)) => {
                debug!(
                    "Record {}: primary ladder exhausted, trying {} encoder",
                    plan.index + 1,
                    secondary.name()
                );
                attempts += 1;
                last_text = simplest.clone();
                let attempt = run_attempt(
                    secondary.as_ref(),
                    simplest,
                    AttemptStage::SecondChance,
                    config,
                )
                .await;
                if attempt.succeeded {
                    Some(attempt)
                } else {
                    absorb(attempt, &mut last_error, &mut last_raster);
                    None
                }
            }
            _ => None,
        },
    };

    // ── Last resort: display name or placeholder ─────────────────────────
    let accepted = match accepted {
        Some(a) => Some(a),
        None => {
            let text = if plan.display_name.is_empty() {
                config.placeholder_text.clone()
            } else {
                plan.display_name.clone()
            };
            attempts += 1;
            last_text = text.clone();
            let attempt = run_attempt(
                encoders.primary.as_ref(),
                &text,
                AttemptStage::LastResort,
                config,
            )
            .await;
            if attempt.succeeded {
                Some(attempt)
            } else {
                absorb(attempt, &mut last_error, &mut last_raster);
                None
            }
        }
    };

    // ── Full verification ────────────────────────────────────────────────
    match accepted {
        Some(attempt) => {
            let raster = attempt
                .raster
                .unwrap_or_else(|| blank_canvas(config.raster_size));
            let counts = census(&raster);
            let error = if counts.is_symbol() {
                debug!(
                    "Record {}: verified ({} dark / {} light) via {:?}",
                    plan.index + 1,
                    counts.dark,
                    counts.light,
                    attempt.stage
                );
                None
            } else {
                warn!(
                    "Record {} ({}): raster failed verification ({} dark / {} light)",
                    plan.index + 1,
                    plan.display_name,
                    counts.dark,
                    counts.light
                );
                Some(RecordError::Unverified {
                    record: plan.index + 1,
                    dark: counts.dark,
                    light: counts.light,
                })
            };
            RecordOutcome {
                index: plan.index,
                display_name: plan.display_name,
                display_position: plan.display_position,
                succeeded: error.is_none(),
                raster,
                payload_used: attempt.payload,
                stage: Some(attempt.stage),
                attempts,
                candidates: plan.payloads,
                error,
            }
        }
        None => {
            let detail = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no encode attempt was made".to_string());
            warn!(
                "Record {} ({}): all {} encode attempts failed: {}",
                plan.index + 1,
                plan.display_name,
                attempts,
                detail
            );
            RecordOutcome {
                index: plan.index,
                display_name: plan.display_name,
                display_position: plan.display_position,
                succeeded: false,
                raster: last_raster.unwrap_or_else(|| blank_canvas(config.raster_size)),
                payload_used: last_text,
                stage: None,
                attempts,
                candidates: plan.payloads,
                error: Some(RecordError::EncodeExhausted {
                    record: plan.index + 1,
                    attempts,
                    detail,
                }),
            }
        }
    }
}

/// Keep the error and any rejected raster of a failed attempt.
fn absorb(
    attempt: EncodeAttempt,
    last_error: &mut Option<EncodeError>,
    last_raster: &mut Option<RgbaImage>,
) {
    if let Some(raster) = attempt.raster {
        *last_raster = Some(raster);
    }
    if let Some(e) = attempt.error {
        *last_error = Some(e);
    }
}

/// Encode `text` once. `succeeded` means a raster came back, not that it is usable.
pub async fn encode_once(
    encoder: &dyn QrEncoder,
    text: &str,
    stage: AttemptStage,
    config: &GenerationConfig,
) -> EncodeAttempt {
    let level = config.error_correction.level_for(text);
    if !level.fits(text) {
        debug!(
            "{:?}: {} bytes exceeds level {} budget of {} bytes",
            stage,
            text.len(),
            level,
            level.max_capacity()
        );
    }
    let opts = EncodeOptions::from_config(config, level);

    match encoder.encode(text, &opts).await {
        Ok(raster) => {
            debug!("{:?}: encoded {} bytes at level {}", stage, text.len(), level);
            EncodeAttempt {
                payload: text.to_string(),
                stage,
                raster: Some(raster),
                succeeded: true,
                error: None,
            }
        }
        Err(e) => {
            warn!("{:?}: {} encoder failed: {}", stage, encoder.name(), e);
            EncodeAttempt {
                payload: text.to_string(),
                stage,
                raster: None,
                succeeded: false,
                error: Some(e),
            }
        }
    }
}

/// Downgrade an attempt whose raster samples as uniformly white.
pub fn check_blank(mut attempt: EncodeAttempt) -> EncodeAttempt {
    let blank = attempt.raster.as_ref().map(is_blank_sample).unwrap_or(true);
    if attempt.succeeded && blank {
        warn!("{:?}: encoder returned a blank raster", attempt.stage);
        attempt.succeeded = false;
        attempt.error = Some(EncodeError::BlankRaster);
    }
    attempt
}

/// [`encode_once`] followed by [`check_blank`].
pub async fn run_attempt(
    encoder: &dyn QrEncoder,
    text: &str,
    stage: AttemptStage,
    config: &GenerationConfig,
) -> EncodeAttempt {
    check_blank(encode_once(encoder, text, stage, config).await)
}
