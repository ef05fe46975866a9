//! Watermark text rasterization.
//!
//! Renders watermark text to a transparent RGBA stamp using the embedded
//! 8x8 bitmap face, scaled by nearest-neighbor integer factors. The stamp
//! carries glyph coverage in its alpha channel; the blend stage applies
//! the run's opacity on top of it.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

/// RGB color for rendered watermark text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// White color.
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Black color.
    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Parse a hex color string into RGB components.
    ///
    /// Supports both #RGB and #RRGGBB formats.
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let hex = hex
            .strip_prefix('#')
            .ok_or_else(|| "Color must start with '#'".to_string())?;

        match hex.len() {
            3 => {
                // #RGB format - each digit is doubled: 0xF -> 0xFF
                let r = u8::from_str_radix(&hex[0..1], 16)
                    .map_err(|_| "Invalid hex digit".to_string())?;
                let g = u8::from_str_radix(&hex[1..2], 16)
                    .map_err(|_| "Invalid hex digit".to_string())?;
                let b = u8::from_str_radix(&hex[2..3], 16)
                    .map_err(|_| "Invalid hex digit".to_string())?;
                Ok(Color::new(r * 17, g * 17, b * 17))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16)
                    .map_err(|_| "Invalid hex digit".to_string())?;
                let g = u8::from_str_radix(&hex[2..4], 16)
                    .map_err(|_| "Invalid hex digit".to_string())?;
                let b = u8::from_str_radix(&hex[4..6], 16)
                    .map_err(|_| "Invalid hex digit".to_string())?;
                Ok(Color::new(r, g, b))
            }
            _ => Err(format!(
                "Color must be #RGB or #RRGGBB format, got {} characters",
                hex.len()
            )),
        }
    }
}

/// Integer scale factor for the 8x8 face at the requested font size.
fn glyph_scale(font_size_px: u32) -> u32 {
    (font_size_px / 8).max(1)
}

/// Calculate the dimensions of rendered text.
///
/// Each glyph occupies an 8x8 cell scaled by `glyph_scale`, with a
/// one-scale-unit gap between adjacent glyphs and no trailing gap.
/// Returns (width, height) in pixels; (0, 0) for empty text.
pub fn measure_text(text: &str, font_size_px: u32) -> (u32, u32) {
    let count = text.chars().count() as u32;
    if count == 0 {
        return (0, 0);
    }

    let scale = glyph_scale(font_size_px);
    let cell = 8 * scale;
    let width = count * cell + (count - 1) * scale;

    (width, cell)
}

/// Render text to a transparent RGBA stamp.
///
/// Covered pixels carry the given color at full alpha; everything else is
/// fully transparent. Characters outside the basic 8x8 set fall back to '?'.
pub fn render_stamp(text: &str, font_size_px: u32, color: Color) -> RgbaImage {
    let (width, height) = measure_text(text, font_size_px);
    if width == 0 || height == 0 {
        return RgbaImage::new(0, 0);
    }

    let scale = glyph_scale(font_size_px);
    let cell = 8 * scale;
    let mut stamp = RgbaImage::new(width, height);
    let on = Rgba([color.r, color.g, color.b, 255]);

    let mut cursor_x = 0u32;
    for ch in text.chars() {
        let glyph = BASIC_FONTS
            .get(ch)
            .unwrap_or_else(|| BASIC_FONTS.get('?').unwrap_or([0u8; 8]));

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..8u32 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let base_x = cursor_x + col * scale;
                let base_y = row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = base_x + dx;
                        let y = base_y + dy;
                        if x < width && y < height {
                            stamp.put_pixel(x, y, on);
                        }
                    }
                }
            }
        }

        cursor_x += cell + scale;
    }

    stamp
}

/// Rotate a stamp by the specified degrees (clockwise), expanding the
/// canvas to the rotated bounding box.
///
/// Sampling is done by inverse mapping with bilinear interpolation so
/// glyph edges stay smooth after rotation.
pub fn rotate_stamp(stamp: &RgbaImage, degrees: f32) -> RgbaImage {
    if degrees == 0.0 || stamp.width() == 0 || stamp.height() == 0 {
        return stamp.clone();
    }

    let radians = -degrees.to_radians(); // Negative for clockwise
    let cos = radians.cos();
    let sin = radians.sin();

    let src_w = stamp.width() as f32;
    let src_h = stamp.height() as f32;
    let cx = src_w / 2.0;
    let cy = src_h / 2.0;

    // Rotated bounding box from the four corners
    let corners = [
        (-cx, -cy),
        (src_w - cx, -cy),
        (-cx, src_h - cy),
        (src_w - cx, src_h - cy),
    ];

    let rotated_corners: Vec<(f32, f32)> = corners
        .iter()
        .map(|(x, y)| (x * cos - y * sin, x * sin + y * cos))
        .collect();

    let min_x = rotated_corners
        .iter()
        .map(|(x, _)| *x)
        .fold(f32::INFINITY, f32::min);
    let max_x = rotated_corners
        .iter()
        .map(|(x, _)| *x)
        .fold(f32::NEG_INFINITY, f32::max);
    let min_y = rotated_corners
        .iter()
        .map(|(_, y)| *y)
        .fold(f32::INFINITY, f32::min);
    let max_y = rotated_corners
        .iter()
        .map(|(_, y)| *y)
        .fold(f32::NEG_INFINITY, f32::max);

    let dst_w = (max_x - min_x).ceil() as u32;
    let dst_h = (max_y - min_y).ceil() as u32;

    let mut rotated = RgbaImage::new(dst_w.max(1), dst_h.max(1));

    let dst_cx = dst_w as f32 / 2.0;
    let dst_cy = dst_h as f32 / 2.0;

    // Inverse rotation for sampling
    let inv_cos = (-radians).cos();
    let inv_sin = (-radians).sin();

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let rx = dx as f32 - dst_cx;
            let ry = dy as f32 - dst_cy;

            let sx = rx * inv_cos - ry * inv_sin + cx;
            let sy = rx * inv_sin + ry * inv_cos + cy;

            if sx >= 0.0 && sx < src_w - 1.0 && sy >= 0.0 && sy < src_h - 1.0 {
                let x0 = sx.floor() as u32;
                let y0 = sy.floor() as u32;
                let x1 = x0 + 1;
                let y1 = y0 + 1;

                let fx = sx - x0 as f32;
                let fy = sy - y0 as f32;

                let p00 = stamp.get_pixel(x0, y0);
                let p10 = stamp.get_pixel(x1, y0);
                let p01 = stamp.get_pixel(x0, y1);
                let p11 = stamp.get_pixel(x1, y1);

                let interpolate = |c: usize| -> u8 {
                    let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
                        + p10[c] as f32 * fx * (1.0 - fy)
                        + p01[c] as f32 * (1.0 - fx) * fy
                        + p11[c] as f32 * fx * fy;
                    v.clamp(0.0, 255.0) as u8
                };

                rotated.put_pixel(
                    dx,
                    dy,
                    Rgba([
                        interpolate(0),
                        interpolate(1),
                        interpolate(2),
                        interpolate(3),
                    ]),
                );
            }
        }
    }

    rotated
}
