//! Image decoding with caching and safety guards.
//!
//! Resolves an opaque image reference (URL, data URI, file path, or raw
//! bytes) into an immutable [`SourceImage`] pixel buffer. Decoded URL
//! sources are cached so a watermark-spec change does not re-fetch and
//! re-decode the same source.

use crate::constants::{DEFAULT_MAX_DIMENSION, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_PIXELS};
use crate::error::DecodeError;
use crate::fetch::{ByteSource, SourceError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use image::io::Reader as ImageReader;
use image::RgbaImage;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Safety limits applied before a source is fully decoded.
#[derive(Debug, Clone)]
pub struct DecodeLimits {
    /// Maximum accepted encoded payload size in bytes.
    pub max_image_bytes: usize,
    /// Maximum accepted width or height.
    pub max_dimension: u32,
    /// Maximum accepted total pixel count.
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// Parsed source location for image references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Network URL resolved through the byte source.
    Url(String),
    /// Inline `data:<mime>;base64,<payload>` reference, already decoded.
    DataUri(Bytes),
    /// Local file path.
    Path(PathBuf),
}

impl ImageReference {
    /// Parse a reference string.
    ///
    /// `http://` and `https://` references become [`ImageReference::Url`],
    /// `data:` references are decoded inline, and anything else is treated
    /// as a local file path.
    pub fn parse(reference: &str) -> Result<Self, DecodeError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(ImageReference::Url(reference.to_string()));
        }

        if let Some(rest) = reference.strip_prefix("data:") {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                DecodeError::unreadable("data URI is missing the ',' payload separator")
            })?;
            if !header.ends_with(";base64") {
                return Err(DecodeError::unreadable(
                    "only base64-encoded data URIs are supported",
                ));
            }
            let bytes = BASE64
                .decode(payload.as_bytes())
                .map_err(|e| DecodeError::unreadable(format!("invalid base64 payload: {}", e)))?;
            return Ok(ImageReference::DataUri(Bytes::from(bytes)));
        }

        Ok(ImageReference::Path(PathBuf::from(reference)))
    }
}

/// Immutable handle to decoded pixel data.
///
/// The buffer is RGBA8 and never mutated after creation; composition runs
/// share it read-only behind an `Arc` and blend onto fresh copies.
#[derive(Clone)]
pub struct SourceImage {
    image: RgbaImage,
    id: String,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("id", &self.id)
            .finish()
    }
}

impl SourceImage {
    /// Decode encoded bytes into a source image, applying safety guards.
    pub fn from_bytes(bytes: &[u8], limits: &DecodeLimits) -> Result<Self, DecodeError> {
        if bytes.len() > limits.max_image_bytes {
            return Err(DecodeError::TooLarge {
                size: bytes.len(),
                max_size: limits.max_image_bytes,
            });
        }

        // Header-declared dimensions are checked before the full decode so
        // an image bomb never allocates its pixel buffer.
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::unreadable(e.to_string()))?
            .into_dimensions()
            .map_err(|e| DecodeError::unreadable(e.to_string()))?;

        let pixels = width as u64 * height as u64;
        if width > limits.max_dimension || height > limits.max_dimension
            || pixels > limits.max_pixels
        {
            return Err(DecodeError::image_bomb(width, height, limits.max_pixels));
        }

        let decoded = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::unreadable(e.to_string()))?
            .decode()
            .map_err(|e| DecodeError::unreadable(e.to_string()))?;

        Ok(Self {
            image: decoded.to_rgba8(),
            id: hex::encode(Sha256::digest(bytes)),
        })
    }

    /// Wrap an already-decoded RGBA buffer. The id is content-addressed
    /// from the raw pixel data and dimensions.
    pub fn from_rgba(image: RgbaImage) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(image.width().to_be_bytes());
        hasher.update(image.height().to_be_bytes());
        hasher.update(image.as_raw());
        let id = hex::encode(hasher.finalize());
        Self { image, id }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGBA8 samples, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Content-addressed identity of the encoded source.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fresh mutable copy of the pixel buffer for a blend run.
    pub fn to_rgba(&self) -> RgbaImage {
        self.image.clone()
    }
}

/// Decoder with a TTL-bounded cache of decoded URL sources.
#[derive(Clone)]
pub struct ImageDecoder {
    source: Arc<dyn ByteSource>,
    cache: Cache<String, Arc<SourceImage>>,
    limits: DecodeLimits,
}

impl ImageDecoder {
    pub fn new(
        source: Arc<dyn ByteSource>,
        limits: DecodeLimits,
        cache_entries: u64,
        cache_ttl: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_entries)
            .time_to_live(cache_ttl)
            .build();

        Self {
            source,
            cache,
            limits,
        }
    }

    /// Resolve and decode an image reference.
    ///
    /// URL references go through the byte source and populate the cache;
    /// data URIs, file paths, and in-memory bytes are decoded directly.
    pub async fn decode(&self, reference: &str) -> Result<Arc<SourceImage>, DecodeError> {
        match ImageReference::parse(reference)? {
            ImageReference::Url(url) => {
                if let Some(cached) = self.cache.get(&url).await {
                    return Ok(cached);
                }

                let bytes = self.source.fetch(&url).await.map_err(|e| match e {
                    SourceError::Denied { .. } => DecodeError::access_denied(&url, e.to_string()),
                    SourceError::TooLarge { size, limit } => DecodeError::TooLarge {
                        size,
                        max_size: limit,
                    },
                    _ => DecodeError::fetch_failed(&url, e.to_string()),
                })?;

                let image = Arc::new(SourceImage::from_bytes(&bytes, &self.limits)?);
                self.cache.insert(url, Arc::clone(&image)).await;
                Ok(image)
            }
            ImageReference::DataUri(bytes) => {
                Ok(Arc::new(SourceImage::from_bytes(&bytes, &self.limits)?))
            }
            ImageReference::Path(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    let reference = path.display().to_string();
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DecodeError::access_denied(reference, e.to_string())
                    } else {
                        DecodeError::fetch_failed(reference, e.to_string())
                    }
                })?;
                Ok(Arc::new(SourceImage::from_bytes(&bytes, &self.limits)?))
            }
        }
    }

    /// Look up an already-decoded URL source without triggering a fetch.
    ///
    /// A hit lets the orchestrator skip the decoding stage when only the
    /// watermark spec changed.
    pub async fn cached(&self, reference: &str) -> Option<Arc<SourceImage>> {
        match ImageReference::parse(reference) {
            Ok(ImageReference::Url(url)) => self.cache.get(&url).await,
            _ => None,
        }
    }

    /// Number of decoded sources currently cached.
    pub fn cache_size(&self) -> u64 {
        self.cache.entry_count()
    }
}
