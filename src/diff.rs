//! Pixel-level visual diffing of PNG captures.
//!
//! Given two captures claimed to represent the same element, decides pixel
//! equality and produces a single horizontal composite image for one-glance
//! human review: `[before, after, diff]` when dimensions match, or
//! `[before, after]` when they do not (a pixel overlay is meaningless when
//! the shapes differ).

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Pixels between composite panels
const GUTTER: u32 = 4;

/// Result type for diff operations
pub type DiffOutcome<T> = Result<T, DiffError>;

/// Error types for diff operations
#[derive(Debug)]
pub enum DiffError {
    /// Input buffer could not be decoded as a PNG
    Decode(String),

    /// Composite could not be encoded
    Encode(String),
}

impl std::fmt::Display for DiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffError::Decode(msg) => write!(f, "Failed to decode PNG: {}", msg),
            DiffError::Encode(msg) => write!(f, "Failed to encode PNG: {}", msg),
        }
    }
}

impl std::error::Error for DiffError {}

/// Result of comparing two captures
#[derive(Debug, Clone)]
pub struct DiffResult {
    /// No differing pixels (always false on a dimension mismatch)
    pub identical: bool,

    /// Both images had the same dimensions
    pub dimensions_match: bool,

    /// Number of differing pixels (zero when dimensions differ)
    pub mismatched: u64,

    /// Horizontal composite PNG of [before, after, diff-if-comparable]
    pub composite: Vec<u8>,
}

/// Compare two PNG buffers and build the review composite.
///
/// Undecodable input is an error, never a "non-identical" verdict.
pub fn visual_diff(before: &[u8], after: &[u8]) -> DiffOutcome<DiffResult> {
    let img_before = decode_png(before)?;
    let img_after = decode_png(after)?;

    if img_before.dimensions() != img_after.dimensions() {
        let composite = encode_png(&stitch(&[&img_before, &img_after]))?;
        return Ok(DiffResult {
            identical: false,
            dimensions_match: false,
            mismatched: 0,
            composite,
        });
    }

    let (highlight, mismatched) = highlight_differences(&img_before, &img_after);
    let composite = encode_png(&stitch(&[&img_before, &img_after, &highlight]))?;

    Ok(DiffResult {
        identical: mismatched == 0,
        dimensions_match: true,
        mismatched,
        composite,
    })
}

/// Per-pixel comparison producing a red-highlight image and a mismatch count
fn highlight_differences(before: &RgbaImage, after: &RgbaImage) -> (RgbaImage, u64) {
    let (width, height) = before.dimensions();
    let mut highlight = RgbaImage::new(width, height);
    let mut mismatched = 0u64;

    for (i, (a, b)) in before.pixels().zip(after.pixels()).enumerate() {
        let (x, y) = (i as u32 % width, i as u32 / width);
        if a == b {
            highlight.put_pixel(x, y, Rgba([0, 0, 0, 0]));
        } else {
            mismatched += 1;
            // Red with alpha scaled by the largest channel delta
            let delta = a
                .0
                .iter()
                .zip(b.0.iter())
                .map(|(&ca, &cb)| ca.abs_diff(cb))
                .max()
                .unwrap_or(255);
            let alpha = delta.saturating_mul(2).max(128);
            highlight.put_pixel(x, y, Rgba([255, 0, 0, alpha]));
        }
    }

    (highlight, mismatched)
}

/// Join panels horizontally with a fixed transparent gutter
fn stitch(panels: &[&RgbaImage]) -> RgbaImage {
    let width: u32 =
        panels.iter().map(|p| p.width()).sum::<u32>() + GUTTER * (panels.len() as u32 - 1);
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);

    let mut out = RgbaImage::new(width, height);
    let mut offset = 0u32;
    for panel in panels {
        for (x, y, px) in panel.enumerate_pixels() {
            out.put_pixel(offset + x, y, *px);
        }
        offset += panel.width() + GUTTER;
    }
    out
}

/// Decode PNG bytes into an RGBA image
pub fn decode_png(data: &[u8]) -> DiffOutcome<RgbaImage> {
    image::load_from_memory_with_format(data, ImageFormat::Png)
        .map(|img| img.to_rgba8())
        .map_err(|e| DiffError::Decode(e.to_string()))
}

/// Encode an RGBA image to PNG bytes
pub fn encode_png(image: &RgbaImage) -> DiffOutcome<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| DiffError::Encode(e.to_string()))?;
    Ok(bytes)
}
