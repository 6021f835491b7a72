//! Raster verification: is this image actually a QR symbol?
//!
//! Encoders can "succeed" while drawing nothing (a canvas left white, an
//! image that never loaded). Two checks guard against that:
//!
//! * [`is_blank_sample`] — a cheap lattice sample taken right after each
//!   attempt; an all-white sample sends the ladder to the next candidate.
//! * [`census`] — a full pass over every pixel once a raster is accepted;
//!   a real symbol has both dark and light modules.

use image::RgbaImage;

/// Grid points per axis sampled by [`is_blank_sample`].
pub const SAMPLE_GRID: u32 = 16;

/// Channel value below which a pixel counts as dark.
pub const DARK_THRESHOLD: u8 = 128;

/// Dark/light pixel counts over the opaque pixels of a raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelCensus {
    pub dark: u64,
    pub light: u64,
}

impl PixelCensus {
    /// A QR symbol needs at least one module of each colour.
    pub fn is_symbol(&self) -> bool {
        self.dark > 0 && self.light > 0
    }
}

/// Classify every opaque pixel: dark if any channel is below
/// [`DARK_THRESHOLD`], light otherwise. Transparent pixels are ignored.
pub fn census(img: &RgbaImage) -> PixelCensus {
    let mut counts = PixelCensus::default();
    for px in img.pixels() {
        let [r, g, b, a] = px.0;
        if a == 0 {
            continue;
        }
        if r < DARK_THRESHOLD || g < DARK_THRESHOLD || b < DARK_THRESHOLD {
            counts.dark += 1;
        } else {
            counts.light += 1;
        }
    }
    counts
}

/// Sample a `SAMPLE_GRID` × `SAMPLE_GRID` lattice spread over the whole
/// raster and report whether every sampled pixel is pure white.
///
/// The lattice spans the full image rather than a corner patch: with a
/// one-module quiet zone the top-left corner of a small symbol is entirely
/// margin, and a corner sample would reject perfectly good output.
pub fn is_blank_sample(img: &RgbaImage) -> bool {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return true;
    }

    for gy in 0..SAMPLE_GRID {
        for gx in 0..SAMPLE_GRID {
            let x = sample_coord(gx, w);
            let y = sample_coord(gy, h);
            let [r, g, b, _] = img.get_pixel(x, y).0;
            if r != 255 || g != 255 || b != 255 {
                return false;
            }
        }
    }
    true
}

/// Centre of the `i`-th of `SAMPLE_GRID` equal cells along an axis of `len` pixels.
fn sample_coord(i: u32, len: u32) -> u32 {
    let pos = (u64::from(i) * 2 + 1) * u64::from(len) / (u64::from(SAMPLE_GRID) * 2);
    (pos as u32).min(len - 1)
}

/// A solid white canvas, used as the placeholder when no raster was produced.
pub fn blank_canvas(size: u32) -> RgbaImage {
    RgbaImage::from_pixel(size, size, image::Rgba([255, 255, 255, 255]))
}
