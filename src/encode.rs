//! Image encoder abstraction and the composited result type.
//!
//! Provides a trait-based encoder system so the pipeline can serialize a
//! composited pixel buffer to PNG (lossless), JPEG (lossy), or WebP
//! (lossless) without caring which codec is behind it. Encoding is
//! deterministic: the same pixel buffer always produces the same bytes.

use crate::error::EncodeError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// Supported output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    /// MIME type for the encoded resource.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OutputFormat {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::Webp),
            _ => Err(EncodeError::unsupported_format(s)),
        }
    }
}

/// Trait for pixel buffer encoders.
///
/// Implementations serialize raw RGBA data to a specific format. The trait
/// is object-safe so the factory can hand out boxed encoders.
pub trait PixelEncoder: Send + Sync {
    /// The output format this encoder produces.
    fn format(&self) -> OutputFormat;

    /// Encode raw RGBA8 data (4 bytes per pixel, row-major).
    fn encode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError>;

    /// Check if this encoder preserves the alpha channel.
    fn supports_transparency(&self) -> bool;
}

/// PNG encoder using the image crate (lossless).
pub struct PngEncoder;

impl PixelEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
        use image::codecs::png::PngEncoder as ImagePngEncoder;
        use image::ImageEncoder as _;
        use std::io::Cursor;

        let mut output = Cursor::new(Vec::new());
        let encoder = ImagePngEncoder::new(&mut output);

        encoder
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| EncodeError::write_failed("png", e.to_string()))?;

        Ok(output.into_inner())
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// JPEG encoder using the image crate (lossy).
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Create a JPEG encoder with the given quality (clamped to 1-100).
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl PixelEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
        use image::ImageEncoder as _;
        use std::io::Cursor;

        // JPEG has no alpha channel
        let rgb_data = rgba_to_rgb(data);

        let mut output = Cursor::new(Vec::new());
        let encoder = ImageJpegEncoder::new_with_quality(&mut output, self.quality);

        encoder
            .write_image(&rgb_data, width, height, image::ColorType::Rgb8)
            .map_err(|e| EncodeError::write_failed("jpeg", e.to_string()))?;

        Ok(output.into_inner())
    }

    fn supports_transparency(&self) -> bool {
        false
    }
}

/// WebP encoder using the image crate.
///
/// The image crate only supports lossless WebP encoding, which suits the
/// purity guarantee anyway.
pub struct WebPEncoder;

impl PixelEncoder for WebPEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Webp
    }

    fn encode(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
        use image::codecs::webp::WebPEncoder as ImageWebPEncoder;
        use image::ImageEncoder as _;
        use std::io::Cursor;

        let mut output = Cursor::new(Vec::new());
        let encoder = ImageWebPEncoder::new_lossless(&mut output);

        encoder
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| EncodeError::write_failed("webp", e.to_string()))?;

        Ok(output.into_inner())
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// Factory for creating encoders based on output format.
pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(format: OutputFormat, jpeg_quality: u8) -> Box<dyn PixelEncoder> {
        match format {
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::Jpeg => Box::new(JpegEncoder::new(jpeg_quality)),
            OutputFormat::Webp => Box::new(WebPEncoder),
        }
    }
}

/// Encode a raw RGBA8 buffer to the requested format.
pub fn encode(
    data: &[u8],
    width: u32,
    height: u32,
    format: OutputFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    EncoderFactory::create(format, jpeg_quality).encode(data, width, height)
}

/// Convert RGBA to RGB by discarding the alpha channel.
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let pixel_count = rgba.len() / 4;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    for chunk in rgba.chunks_exact(4) {
        rgb.push(chunk[0]);
        rgb.push(chunk[1]);
        rgb.push(chunk[2]);
    }

    rgb
}

/// A published composition result.
///
/// Immutable once produced; a newer run supersedes it with a fresh
/// instance instead of patching it.
#[derive(Clone)]
pub struct CompositedImage {
    pub encoding: OutputFormat,
    pub bytes: Bytes,
    /// Content-addressed id of the source the composition was built from.
    pub source_image_id: String,
    /// Fingerprint of the watermark spec used for this run.
    pub spec_fingerprint: String,
}

impl fmt::Debug for CompositedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositedImage")
            .field("encoding", &self.encoding)
            .field("bytes", &self.bytes.len())
            .field("source_image_id", &self.source_image_id)
            .field("spec_fingerprint", &self.spec_fingerprint)
            .finish()
    }
}

impl CompositedImage {
    /// Render as a self-contained `data:<mime>;base64,<payload>` reference,
    /// directly usable as an image source or download payload.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.encoding.mime_type(),
            BASE64.encode(&self.bytes)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pixels() -> Vec<u8> {
        // 2x2 RGBA: red, green, blue, semi-transparent white
        vec![
            255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 128,
        ]
    }

    // Test: format parsing is case-insensitive and rejects unknown names
    #[test]
    fn test_output_format_from_str() {
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("WebP".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);

        let err = "tga".parse::<OutputFormat>().unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");
    }

    #[test]
    fn test_output_format_metadata() {
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Webp.mime_type(), "image/webp");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Png.to_string(), "png");
    }

    #[test]
    fn test_factory_creates_each_encoder() {
        let png = EncoderFactory::create(OutputFormat::Png, 80);
        assert_eq!(png.format(), OutputFormat::Png);
        assert!(png.supports_transparency());

        let jpeg = EncoderFactory::create(OutputFormat::Jpeg, 80);
        assert_eq!(jpeg.format(), OutputFormat::Jpeg);
        assert!(!jpeg.supports_transparency());

        let webp = EncoderFactory::create(OutputFormat::Webp, 80);
        assert_eq!(webp.format(), OutputFormat::Webp);
        assert!(webp.supports_transparency());
    }

    #[test]
    fn test_png_encoder_magic_bytes() {
        let bytes = encode(&test_pixels(), 2, 2, OutputFormat::Png, 80).unwrap();
        assert_eq!(&bytes[0..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_jpeg_encoder_magic_bytes() {
        let bytes = encode(&test_pixels(), 2, 2, OutputFormat::Jpeg, 80).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_webp_encoder_magic_bytes() {
        let bytes = encode(&test_pixels(), 2, 2, OutputFormat::Webp, 80).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    // Test: same pixels always encode to the same bytes
    #[test]
    fn test_encode_deterministic() {
        for format in [OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::Webp] {
            let a = encode(&test_pixels(), 2, 2, format, 80).unwrap();
            let b = encode(&test_pixels(), 2, 2, format, 80).unwrap();
            assert_eq!(a, b, "{} encoding must be deterministic", format);
        }
    }

    // Test: lossless round-trip reproduces the exact pixel values
    #[test]
    fn test_png_round_trip_lossless() {
        let pixels = test_pixels();
        let bytes = encode(&pixels, 2, 2, OutputFormat::Png, 80).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw().as_slice(), pixels.as_slice());
    }

    #[test]
    fn test_jpeg_quality_clamped() {
        let encoder = JpegEncoder::new(200);
        let result = encoder.encode(&test_pixels(), 2, 2);
        assert!(result.is_ok());
    }

    #[test]
    fn test_rgba_to_rgb() {
        let rgba = vec![255, 128, 64, 255, 0, 0, 0, 128];
        assert_eq!(rgba_to_rgb(&rgba), vec![255, 128, 64, 0, 0, 0]);
    }

    // Test: data URI rendering is self-contained and decodable
    #[test]
    fn test_composited_image_data_uri() {
        let bytes = encode(&test_pixels(), 2, 2, OutputFormat::Png, 80).unwrap();
        let image = CompositedImage {
            encoding: OutputFormat::Png,
            bytes: Bytes::from(bytes.clone()),
            source_image_id: "abc".to_string(),
            spec_fingerprint: "def".to_string(),
        };

        let uri = image.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));

        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(BASE64.decode(payload).unwrap(), bytes);
    }
}
