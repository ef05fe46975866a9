//! Tile pattern generation for watermark placement.
//!
//! Computes the deterministic grid of placements that covers an image with
//! repeated watermark stamps. The grid stride is derived from the font size
//! so the pattern density tracks the rendered text size.

use crate::constants::DEFAULT_ROTATION_DEGREES;

/// One instance of the watermark text drawn at a tile position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub rotation_degrees: f32,
}

impl Placement {
    pub fn new(x: f32, y: f32, rotation_degrees: f32) -> Self {
        Self {
            x,
            y,
            rotation_degrees,
        }
    }
}

/// Calculate tile placements covering the full image extent.
///
/// The stride in both axes is `font_size_px * stride_factor`. Placements are
/// enumerated row-major in ascending order, starting one stride before the
/// origin so rotated stamps spill into the top and left edges instead of
/// leaving them blank. The default rotation is applied uniformly.
///
/// Returns an empty sequence when either dimension is zero or the text is
/// empty (watermarking degenerates to a no-op).
pub fn compute_tiles(
    width: u32,
    height: u32,
    text: &str,
    font_size_px: u32,
    stride_factor: f32,
) -> Vec<Placement> {
    compute_tiles_with_rotation(
        width,
        height,
        text,
        font_size_px,
        stride_factor,
        DEFAULT_ROTATION_DEGREES,
    )
}

/// Same as [`compute_tiles`] with an explicit uniform rotation angle.
pub fn compute_tiles_with_rotation(
    width: u32,
    height: u32,
    text: &str,
    font_size_px: u32,
    stride_factor: f32,
    rotation_degrees: f32,
) -> Vec<Placement> {
    if width == 0 || height == 0 || text.is_empty() {
        return Vec::new();
    }
    if font_size_px == 0 || !stride_factor.is_finite() || stride_factor <= 0.0 {
        return Vec::new();
    }

    let stride = (font_size_px as f32 * stride_factor).max(1.0);
    let mut placements = Vec::new();

    let mut row = -1i64;
    while (row as f32) * stride < height as f32 {
        let mut col = -1i64;
        while (col as f32) * stride < width as f32 {
            placements.push(Placement::new(
                col as f32 * stride,
                row as f32 * stride,
                rotation_degrees,
            ));
            col += 1;
        }
        row += 1;
    }

    placements
}
