//! Configuration types for CSV-to-QR generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. One struct carries the organisation
//! block, the raster geometry, the error-correction policy and the optional
//! injected encoders, so two runs can be compared by diffing their configs.

use crate::error::QrCardError;
use crate::pipeline::encode::QrEncoder;
use crate::pipeline::vcard::OrganizationContext;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a CSV-to-QR generation run.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use csv2qr::{GenerationConfig, OrganizationContext};
///
/// let config = GenerationConfig::builder()
///     .organization(OrganizationContext::new("ACME", "Seoul", "acme.example"))
///     .raster_size(400)
///     .build()
///     .unwrap();
/// assert_eq!(config.raster_size, 400);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Organisation block applied to every record. Default: empty.
    pub organization: OrganizationContext,

    /// Width and height of every produced raster in pixels. Range: 64–2048. Default: 300.
    pub raster_size: u32,

    /// Quiet-zone width in modules around the symbol. Default: 1.
    ///
    /// The QR standard asks for 4; a single module keeps the symbol large on
    /// a small card while every phone scanner we target still locks on.
    pub margin: u32,

    /// How the error-correction level is chosen per payload. Default: `Fixed(L)`.
    pub error_correction: ErrorCorrectionPolicy,

    /// Upper bound on the secondary encoder's image-materialisation wait, in
    /// milliseconds. Default: 3000.
    pub legacy_timeout_ms: u64,

    /// Text encoded as a last resort when a record has no display name. Default: `"QR"`.
    pub placeholder_text: String,

    /// Prefix for the display name of rows without a name; the 1-based row
    /// number is appended. Default: `"사원"`.
    pub unnamed_prefix: String,

    /// Reject the run when the organisation name is empty. Default: false.
    pub require_organization: bool,

    /// Pre-constructed primary encoder. Takes precedence over the built-in one.
    pub encoder: Option<Arc<dyn QrEncoder>>,

    /// Pre-constructed secondary (second-chance) encoder.
    pub fallback_encoder: Option<Arc<dyn QrEncoder>>,

    /// Per-record progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            organization: OrganizationContext::default(),
            raster_size: 300,
            margin: 1,
            error_correction: ErrorCorrectionPolicy::default(),
            legacy_timeout_ms: 3000,
            placeholder_text: "QR".to_string(),
            unnamed_prefix: "사원".to_string(),
            require_organization: false,
            encoder: None,
            fallback_encoder: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("organization", &self.organization)
            .field("raster_size", &self.raster_size)
            .field("margin", &self.margin)
            .field("error_correction", &self.error_correction)
            .field("legacy_timeout_ms", &self.legacy_timeout_ms)
            .field("placeholder_text", &self.placeholder_text)
            .field("unnamed_prefix", &self.unnamed_prefix)
            .field("require_organization", &self.require_organization)
            .field("encoder", &self.encoder.as_ref().map(|e| e.name().to_string()))
            .field(
                "fallback_encoder",
                &self.fallback_encoder.as_ref().map(|e| e.name().to_string()),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl fmt::Debug for GenerationConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl GenerationConfigBuilder {
    pub fn organization(mut self, org: OrganizationContext) -> Self {
        self.config.organization = org;
        self
    }

    pub fn raster_size(mut self, px: u32) -> Self {
        self.config.raster_size = px.clamp(64, 2048);
        self
    }

    pub fn margin(mut self, modules: u32) -> Self {
        self.config.margin = modules.min(8);
        self
    }

    pub fn error_correction(mut self, policy: ErrorCorrectionPolicy) -> Self {
        self.config.error_correction = policy;
        self
    }

    pub fn legacy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.legacy_timeout_ms = ms;
        self
    }

    pub fn placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.config.placeholder_text = text.into();
        self
    }

    pub fn unnamed_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.unnamed_prefix = prefix.into();
        self
    }

    pub fn require_organization(mut self, v: bool) -> Self {
        self.config.require_organization = v;
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn QrEncoder>) -> Self {
        self.config.encoder = Some(encoder);
        self
    }

    pub fn fallback_encoder(mut self, encoder: Arc<dyn QrEncoder>) -> Self {
        self.config.fallback_encoder = Some(encoder);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, QrCardError> {
        let c = &self.config;
        if c.raster_size < 64 || c.raster_size > 2048 {
            return Err(QrCardError::InvalidConfig(format!(
                "raster size must be 64–2048 px, got {}",
                c.raster_size
            )));
        }
        if c.legacy_timeout_ms == 0 {
            return Err(QrCardError::InvalidConfig(
                "legacy timeout must be ≥ 1 ms".into(),
            ));
        }
        if c.placeholder_text.trim().is_empty() {
            return Err(QrCardError::InvalidConfig(
                "placeholder text must not be empty".into(),
            ));
        }
        if c.require_organization && c.organization.name.trim().is_empty() {
            return Err(QrCardError::InvalidConfig(
                "organization name is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Error correction ─────────────────────────────────────────────────────

/// QR error-correction level, lowest to highest redundancy.
///
/// | Level | Recoverable | Max bytes (version 40) |
/// |-------|-------------|------------------------|
/// | L | ~7 %  | 2953 |
/// | M | ~15 % | 2331 |
/// | Q | ~25 % | 1663 |
/// | H | ~30 % | 1273 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCorrectionLevel {
    #[default]
    L,
    M,
    Q,
    H,
}

impl ErrorCorrectionLevel {
    /// Largest byte-mode payload a version-40 symbol holds at this level.
    pub fn max_capacity(self) -> usize {
        match self {
            ErrorCorrectionLevel::L => 2953,
            ErrorCorrectionLevel::M => 2331,
            ErrorCorrectionLevel::Q => 1663,
            ErrorCorrectionLevel::H => 1273,
        }
    }

    /// Advisory level for a payload of `byte_len` bytes.
    ///
    /// Small payloads get M; everything else gets L, favouring a symbol that
    /// always fits over maximal redundancy.
    pub fn recommended_for(byte_len: usize) -> Self {
        if byte_len <= 500 {
            ErrorCorrectionLevel::M
        } else {
            ErrorCorrectionLevel::L
        }
    }

    /// Whether `payload` fits the version-40 budget of this level.
    pub fn fits(self, payload: &str) -> bool {
        payload.len() <= self.max_capacity()
    }
}

impl fmt::Display for ErrorCorrectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCorrectionLevel::L => "L",
            ErrorCorrectionLevel::M => "M",
            ErrorCorrectionLevel::Q => "Q",
            ErrorCorrectionLevel::H => "H",
        };
        f.write_str(s)
    }
}

/// How the controller picks an [`ErrorCorrectionLevel`] for each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrectionPolicy {
    /// Always use the given level. `Fixed(L)` is the default.
    Fixed(ErrorCorrectionLevel),
    /// Use [`ErrorCorrectionLevel::recommended_for`] on each payload's byte length.
    Adaptive,
}

impl Default for ErrorCorrectionPolicy {
    fn default() -> Self {
        ErrorCorrectionPolicy::Fixed(ErrorCorrectionLevel::L)
    }
}

impl ErrorCorrectionPolicy {
    /// Resolve the level to request for `payload`.
    pub fn level_for(&self, payload: &str) -> ErrorCorrectionLevel {
        match self {
            ErrorCorrectionPolicy::Fixed(level) => *level,
            ErrorCorrectionPolicy::Adaptive => ErrorCorrectionLevel::recommended_for(payload.len()),
        }
    }
}
