//! QR encoding capability: payload text → RGBA raster.
//!
//! Symbol generation is treated as an external capability behind the
//! [`QrEncoder`] trait. Two implementations ship with the crate (feature
//! `builtin-encoder`):
//!
//! * [`CanvasEncoder`] — the primary path. Builds the symbol and paints it
//!   straight onto a fixed-size canvas.
//! * [`DataUrlEncoder`] — the secondary path. Produces a PNG `data:` URL and
//!   then materialises it back into a raster, bounded by a timeout. Used only
//!   as a second chance once the primary ladder is exhausted.
//!
//! [`Encoders::resolve`] probes once per run which capabilities exist, so the
//! fallback controller never branches on encoder style per attempt.

use crate::config::{ErrorCorrectionLevel, GenerationConfig};
use crate::error::{EncodeError, QrCardError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DATA_URL_PNG_PREFIX: &str = "data:image/png;base64,";

/// Rendering parameters for one encode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Output width and height in pixels.
    pub size: u32,
    /// Quiet zone in modules.
    pub margin: u32,
    pub color_dark: Rgba<u8>,
    pub color_light: Rgba<u8>,
    pub level: ErrorCorrectionLevel,
    /// Materialisation bound for encoders that load an intermediate image.
    pub timeout: Duration,
}

impl EncodeOptions {
    /// Options for `level`, geometry taken from the run config.
    pub fn from_config(config: &GenerationConfig, level: ErrorCorrectionLevel) -> Self {
        Self {
            size: config.raster_size,
            margin: config.margin,
            color_dark: Rgba([0, 0, 0, 255]),
            color_light: Rgba([255, 255, 255, 255]),
            level,
            timeout: Duration::from_millis(config.legacy_timeout_ms),
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default(), ErrorCorrectionLevel::L)
    }
}

/// Something that can turn text into a QR raster.
///
/// Implementations may fail (payload too long for any symbol version) or,
/// worse, "succeed" with an empty image; the fallback controller verifies
/// every result, so implementations need not self-check.
#[async_trait]
pub trait QrEncoder: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Encode `text` into a `opts.size` × `opts.size` raster.
    async fn encode(&self, text: &str, opts: &EncodeOptions) -> Result<RgbaImage, EncodeError>;
}

/// The encoder capabilities available to a run, probed once up front.
#[derive(Clone)]
pub struct Encoders {
    pub primary: Arc<dyn QrEncoder>,
    /// Second-chance path for the simplest candidate; `None` when the only
    /// capability found is already serving as primary.
    pub secondary: Option<Arc<dyn QrEncoder>>,
}

impl std::fmt::Debug for Encoders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoders")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.as_ref().map(|e| e.name()))
            .finish()
    }
}

impl Encoders {
    /// Probe the available encoders, most-specific first.
    ///
    /// 1. Encoders injected through the config.
    /// 2. Built-in encoders (feature `builtin-encoder`).
    /// 3. If only a secondary capability exists it is promoted to primary.
    ///
    /// # Errors
    /// [`QrCardError::EncoderUnavailable`] when nothing can encode at all.
    pub fn resolve(config: &GenerationConfig) -> Result<Self, QrCardError> {
        let primary = config.encoder.clone().or_else(builtin_primary);
        let secondary = config.fallback_encoder.clone().or_else(builtin_secondary);

        let encoders = match (primary, secondary) {
            (Some(primary), secondary) => Encoders { primary, secondary },
            (None, Some(secondary)) => Encoders {
                primary: secondary,
                secondary: None,
            },
            (None, None) => return Err(QrCardError::EncoderUnavailable),
        };

        info!(
            "QR encoders: primary={}, secondary={}",
            encoders.primary.name(),
            encoders.secondary.as_ref().map(|e| e.name()).unwrap_or("none")
        );
        Ok(encoders)
    }
}

#[cfg(feature = "builtin-encoder")]
fn builtin_primary() -> Option<Arc<dyn QrEncoder>> {
    Some(Arc::new(CanvasEncoder))
}

#[cfg(not(feature = "builtin-encoder"))]
fn builtin_primary() -> Option<Arc<dyn QrEncoder>> {
    None
}

#[cfg(feature = "builtin-encoder")]
fn builtin_secondary() -> Option<Arc<dyn QrEncoder>> {
    Some(Arc::new(DataUrlEncoder::default()))
}

#[cfg(not(feature = "builtin-encoder"))]
fn builtin_secondary() -> Option<Arc<dyn QrEncoder>> {
    None
}

// ── Built-in encoders ────────────────────────────────────────────────────

/// Primary encoder: symbol painted directly onto a fixed-size canvas.
#[cfg(feature = "builtin-encoder")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasEncoder;

#[cfg(feature = "builtin-encoder")]
#[async_trait]
impl QrEncoder for CanvasEncoder {
    fn name(&self) -> &str {
        "canvas"
    }

    async fn encode(&self, text: &str, opts: &EncodeOptions) -> Result<RgbaImage, EncodeError> {
        let text = text.to_string();
        let opts = *opts;
        tokio::task::spawn_blocking(move || {
            let symbol = Symbol::build(&text, opts.level)?;
            Ok(symbol.paint(opts.size, opts.margin, opts.color_dark, opts.color_light))
        })
        .await
        .map_err(|e| EncodeError::Raster(format!("encode task panicked: {e}")))?
    }
}

/// Secondary encoder: PNG data URL, then materialised back into a raster.
#[cfg(feature = "builtin-encoder")]
#[derive(Debug, Clone, Copy)]
pub struct DataUrlEncoder {
    /// Pixels per module in the intermediate PNG.
    pub module_px: u32,
}

#[cfg(feature = "builtin-encoder")]
impl Default for DataUrlEncoder {
    fn default() -> Self {
        Self { module_px: 4 }
    }
}

#[cfg(feature = "builtin-encoder")]
impl DataUrlEncoder {
    /// Encode `text` as a `data:image/png;base64,…` URL at the symbol's
    /// natural size (`module_px` per module).
    pub fn to_data_url(&self, text: &str, opts: &EncodeOptions) -> Result<String, EncodeError> {
        let symbol = Symbol::build(text, opts.level)?;
        let natural = (symbol.width + 2 * opts.margin) * self.module_px.max(1);
        let img = symbol.paint(natural, opts.margin, opts.color_dark, opts.color_light);
        let png = encode_png(&img).map_err(|e| EncodeError::Raster(e.to_string()))?;
        Ok(format!("{DATA_URL_PNG_PREFIX}{}", STANDARD.encode(png)))
    }
}

#[cfg(feature = "builtin-encoder")]
#[async_trait]
impl QrEncoder for DataUrlEncoder {
    fn name(&self) -> &str {
        "data-url"
    }

    async fn encode(&self, text: &str, opts: &EncodeOptions) -> Result<RgbaImage, EncodeError> {
        let this = *self;
        let text = text.to_string();
        let build_opts = *opts;
        let url = tokio::task::spawn_blocking(move || this.to_data_url(&text, &build_opts))
            .await
            .map_err(|e| EncodeError::Raster(format!("encode task panicked: {e}")))??;
        debug!("data URL → {} bytes", url.len());
        materialize_data_url(&url, opts.size, opts.timeout).await
    }
}

/// A generated QR symbol as a square grid of dark/light modules.
#[cfg(feature = "builtin-encoder")]
struct Symbol {
    width: u32,
    dark: Vec<bool>,
}

#[cfg(feature = "builtin-encoder")]
impl Symbol {
    fn build(text: &str, level: ErrorCorrectionLevel) -> Result<Self, EncodeError> {
        let ec = match level {
            ErrorCorrectionLevel::L => qrcode::EcLevel::L,
            ErrorCorrectionLevel::M => qrcode::EcLevel::M,
            ErrorCorrectionLevel::Q => qrcode::EcLevel::Q,
            ErrorCorrectionLevel::H => qrcode::EcLevel::H,
        };
        let code = qrcode::QrCode::with_error_correction_level(text.as_bytes(), ec)
            .map_err(|e| EncodeError::Symbol(e.to_string()))?;
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();
        Ok(Self {
            width: code.width() as u32,
            dark,
        })
    }

    /// Paint onto a `size` × `size` canvas, stretching modules so the symbol
    /// plus `margin` modules of quiet zone fill the canvas exactly.
    fn paint(&self, size: u32, margin: u32, dark: Rgba<u8>, light: Rgba<u8>) -> RgbaImage {
        let total = u64::from(self.width + 2 * margin);
        let size64 = u64::from(size.max(1));
        RgbaImage::from_fn(size, size, |x, y| {
            let mx = (u64::from(x) * total / size64) as i64 - i64::from(margin);
            let my = (u64::from(y) * total / size64) as i64 - i64::from(margin);
            let w = i64::from(self.width);
            if (0..w).contains(&mx) && (0..w).contains(&my) && self.dark[(my * w + mx) as usize] {
                dark
            } else {
                light
            }
        })
    }
}

// ── Shared helpers ───────────────────────────────────────────────────────

/// Decode a PNG data URL into a `size` × `size` raster, giving up after `timeout`.
pub async fn materialize_data_url(
    url: &str,
    size: u32,
    timeout: Duration,
) -> Result<RgbaImage, EncodeError> {
    let url = url.to_string();
    let task = tokio::task::spawn_blocking(move || decode_data_url(&url, size));

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined.map_err(|e| EncodeError::Materialize(format!("task panicked: {e}")))?,
        Err(_) => Err(EncodeError::Timeout {
            ms: timeout.as_millis() as u64,
        }),
    }
}

/// Blocking body of [`materialize_data_url`].
pub fn decode_data_url(url: &str, size: u32) -> Result<RgbaImage, EncodeError> {
    let b64 = url
        .strip_prefix(DATA_URL_PNG_PREFIX)
        .ok_or_else(|| EncodeError::Materialize("not a base64 PNG data URL".into()))?;
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| EncodeError::Materialize(format!("invalid base64: {e}")))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| EncodeError::Materialize(e.to_string()))?
        .to_rgba8();

    if img.dimensions() == (size, size) {
        Ok(img)
    } else {
        Ok(image::imageops::resize(
            &img,
            size,
            size,
            image::imageops::FilterType::Nearest,
        ))
    }
}

/// PNG-encode a raster. PNG keeps module edges crisp; lossy formats blur
/// them into grey and hurt scan reliability.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img.clone()).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded raster → {} bytes PNG", buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::verify::{census, is_blank_sample};

    #[test]
    fn encode_png_roundtrips_dimensions() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn decode_rejects_non_data_urls() {
        let err = decode_data_url("https://example.com/qr.png", 300).unwrap_err();
        assert!(matches!(err, EncodeError::Materialize(_)));
        let err = decode_data_url("data:image/png;base64,@@@", 300).unwrap_err();
        assert!(matches!(err, EncodeError::Materialize(_)));
    }

    #[test]
    fn decode_resizes_to_requested_size() {
        let img = RgbaImage::from_pixel(25, 25, Rgba([0, 0, 0, 255]));
        let url = format!(
            "{DATA_URL_PNG_PREFIX}{}",
            STANDARD.encode(encode_png(&img).unwrap())
        );
        let out = decode_data_url(&url, 100).unwrap();
        assert_eq!(out.dimensions(), (100, 100));
    }

    #[tokio::test]
    async fn materialize_times_out() {
        // A large image and a zero timeout: the timer always fires first.
        let img = RgbaImage::from_pixel(1500, 1500, Rgba([0, 0, 0, 255]));
        let url = format!(
            "{DATA_URL_PNG_PREFIX}{}",
            STANDARD.encode(encode_png(&img).unwrap())
        );
        let err = materialize_data_url(&url, 300, Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err, EncodeError::Timeout { ms: 0 });
    }

    #[cfg(feature = "builtin-encoder")]
    #[tokio::test]
    async fn canvas_encoder_produces_a_symbol() {
        let opts = EncodeOptions::default();
        let img = CanvasEncoder
            .encode("BEGIN:VCARD\nVERSION:3.0\nN:김철수\nEND:VCARD", &opts)
            .await
            .unwrap();
        assert_eq!(img.dimensions(), (300, 300));
        assert!(!is_blank_sample(&img));
        assert!(census(&img).is_symbol());
        // One-module quiet zone: the very corner is light.
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[cfg(feature = "builtin-encoder")]
    #[tokio::test]
    async fn canvas_encoder_rejects_oversized_payload() {
        let opts = EncodeOptions::default();
        let huge = "x".repeat(ErrorCorrectionLevel::L.max_capacity() + 100);
        let err = CanvasEncoder.encode(&huge, &opts).await.unwrap_err();
        assert!(matches!(err, EncodeError::Symbol(_)));
    }

    #[cfg(feature = "builtin-encoder")]
    #[tokio::test]
    async fn data_url_encoder_matches_canvas_geometry() {
        let opts = EncodeOptions::default();
        let url = DataUrlEncoder::default().to_data_url("tel:010", &opts).unwrap();
        assert!(url.starts_with(DATA_URL_PNG_PREFIX));

        let img = DataUrlEncoder::default().encode("tel:010", &opts).await.unwrap();
        assert_eq!(img.dimensions(), (300, 300));
        assert!(census(&img).is_symbol());
    }

    #[cfg(feature = "builtin-encoder")]
    #[test]
    fn resolve_uses_builtins() {
        let enc = Encoders::resolve(&GenerationConfig::default()).unwrap();
        assert_eq!(enc.primary.name(), "canvas");
        assert_eq!(enc.secondary.as_ref().map(|e| e.name()), Some("data-url"));
    }
}
