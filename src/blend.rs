//! Overlay construction and source-over compositing.
//!
//! Builds a coverage overlay from the rendered watermark stamp at every
//! tile placement, then composites it onto a fresh copy of the base pixel
//! buffer. All math runs in normalized f32 and rounds to 8-bit once on
//! store, so repeated overlapping placements accumulate no rounding bias.

use crate::decode::SourceImage;
use crate::error::BlendError;
use crate::glyph::{render_stamp, rotate_stamp, Color};
use crate::tiles::Placement;
use image::RgbaImage;

/// Visual style of the rendered watermark text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkStyle {
    pub font_size_px: u32,
    pub color: Color,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            font_size_px: crate::constants::DEFAULT_FONT_SIZE_PX,
            color: Color::white(),
        }
    }
}

/// Blend the watermark text onto a copy of the base image.
///
/// Renders the stamp once, rotates it by the placements' uniform angle,
/// draws it into a coverage overlay at every placement, and composites the
/// overlay source-over: `out.rgb = wm.rgb*a + base.rgb*(1-a)` with
/// `a = coverage * opacity` and `out.a = base.a`. Opacity outside [0, 1]
/// is clamped, not rejected. The base buffer is never mutated.
pub fn blend(
    base: &SourceImage,
    placements: &[Placement],
    text: &str,
    opacity: f32,
    style: &WatermarkStyle,
) -> Result<RgbaImage, BlendError> {
    let width = base.width();
    let height = base.height();
    if width == 0 || height == 0 {
        return Err(BlendError::invalid_dimensions(width, height));
    }

    let mut output = base.to_rgba();
    if placements.is_empty() || text.is_empty() {
        return Ok(output);
    }

    let opacity = if opacity.is_finite() {
        opacity.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let stamp = render_stamp(text, style.font_size_px, style.color);
    let stamp = rotate_stamp(&stamp, placements[0].rotation_degrees);
    let stamp_w = stamp.width() as i64;
    let stamp_h = stamp.height() as i64;
    if stamp_w == 0 || stamp_h == 0 {
        return Ok(output);
    }

    // Glyph coverage accumulated over the whole canvas, normalized to [0, 1].
    let mut coverage = vec![0.0f32; width as usize * height as usize];

    for placement in placements {
        let px = placement.x.round() as i64;
        let py = placement.y.round() as i64;

        let x_start = px.max(0);
        let y_start = py.max(0);
        let x_end = (px + stamp_w).min(width as i64);
        let y_end = (py + stamp_h).min(height as i64);

        for y in y_start..y_end {
            for x in x_start..x_end {
                let sx = (x - px) as u32;
                let sy = (y - py) as u32;
                let c = stamp.get_pixel(sx, sy)[3] as f32 / 255.0;
                if c <= 0.0 {
                    continue;
                }
                let slot = &mut coverage[y as usize * width as usize + x as usize];
                // Coverage-over accumulation where stamps overlap
                *slot = c + *slot * (1.0 - c);
            }
        }
    }

    let wm_r = style.color.r as f32 / 255.0;
    let wm_g = style.color.g as f32 / 255.0;
    let wm_b = style.color.b as f32 / 255.0;

    for (i, pixel) in output.pixels_mut().enumerate() {
        let a = coverage[i] * opacity;
        if a <= 0.0 {
            continue;
        }

        let blend_channel = |wm: f32, base: u8| -> u8 {
            let v = wm * a + (base as f32 / 255.0) * (1.0 - a);
            (v * 255.0).round().clamp(0.0, 255.0) as u8
        };

        pixel[0] = blend_channel(wm_r, pixel[0]);
        pixel[1] = blend_channel(wm_g, pixel[1]);
        pixel[2] = blend_channel(wm_b, pixel[2]);
        // Alpha stays at the base value; the base is assumed opaque
    }

    Ok(output)
}
