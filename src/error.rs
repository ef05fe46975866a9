//! Composition error types
//!
//! Provides structured errors for every pipeline stage. Each error exposes a
//! stable machine-readable kind plus a human-readable detail so callers can
//! surface failures without parsing messages.

use std::fmt;

/// Errors produced while resolving and decoding a source image
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Bytes are not a supported image format
    Unreadable { detail: String },
    /// The image reference could not be resolved to bytes
    FetchFailed { reference: String, detail: String },
    /// The upstream refused pixel-readable access
    AccessDenied { reference: String, detail: String },
    /// Encoded payload exceeds the configured size limit
    TooLarge { size: usize, max_size: usize },
    /// Declared dimensions exceed safety limits (image bomb protection)
    ImageBomb {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Unreadable { detail } => {
                write!(f, "Failed to decode image: {}", detail)
            }
            DecodeError::FetchFailed { reference, detail } => {
                write!(f, "Failed to fetch '{}': {}", reference, detail)
            }
            DecodeError::AccessDenied { reference, detail } => {
                write!(f, "Access denied for '{}': {}", reference, detail)
            }
            DecodeError::TooLarge { size, max_size } => {
                write!(
                    f,
                    "Source size {} bytes exceeds maximum {} bytes",
                    size, max_size
                )
            }
            DecodeError::ImageBomb {
                width,
                height,
                pixels,
                max_pixels,
            } => {
                write!(
                    f,
                    "Image dimensions {}x{} ({} pixels) exceed limit of {} pixels",
                    width, height, pixels, max_pixels
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    /// Stable error kind for structured reporting
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Unreadable { .. } => "unreadable",
            DecodeError::FetchFailed { .. } => "fetch_failed",
            DecodeError::AccessDenied { .. } => "access_denied",
            DecodeError::TooLarge { .. } => "too_large",
            DecodeError::ImageBomb { .. } => "image_bomb",
        }
    }

    /// Helper constructors for common error patterns
    pub fn unreadable(detail: impl Into<String>) -> Self {
        DecodeError::Unreadable {
            detail: detail.into(),
        }
    }

    pub fn fetch_failed(reference: impl Into<String>, detail: impl Into<String>) -> Self {
        DecodeError::FetchFailed {
            reference: reference.into(),
            detail: detail.into(),
        }
    }

    pub fn access_denied(reference: impl Into<String>, detail: impl Into<String>) -> Self {
        DecodeError::AccessDenied {
            reference: reference.into(),
            detail: detail.into(),
        }
    }

    pub fn image_bomb(width: u32, height: u32, max_pixels: u64) -> Self {
        DecodeError::ImageBomb {
            width,
            height,
            pixels: width as u64 * height as u64,
            max_pixels,
        }
    }
}

/// Errors produced while blending the watermark overlay onto the base
#[derive(Debug, Clone, PartialEq)]
pub enum BlendError {
    /// The base buffer has no area to blend onto
    InvalidDimensions { width: u32, height: u32 },
}

impl fmt::Display for BlendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendError::InvalidDimensions { width, height } => {
                write!(f, "Invalid base dimensions {}x{}: zero area", width, height)
            }
        }
    }
}

impl std::error::Error for BlendError {}

impl BlendError {
    pub fn kind(&self) -> &'static str {
        match self {
            BlendError::InvalidDimensions { .. } => "invalid_dimensions",
        }
    }

    pub fn invalid_dimensions(width: u32, height: u32) -> Self {
        BlendError::InvalidDimensions { width, height }
    }
}

/// Errors produced while serializing the composited pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// Requested output format is not recognized
    UnsupportedFormat { format: String },
    /// The codec rejected the pixel buffer
    WriteFailed { format: String, detail: String },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::UnsupportedFormat { format } => {
                write!(f, "Unsupported output format: {}", format)
            }
            EncodeError::WriteFailed { format, detail } => {
                write!(f, "Failed to encode to {}: {}", format, detail)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

impl EncodeError {
    pub fn kind(&self) -> &'static str {
        match self {
            EncodeError::UnsupportedFormat { .. } => "unsupported_format",
            EncodeError::WriteFailed { .. } => "write_failed",
        }
    }

    pub fn unsupported_format(format: impl Into<String>) -> Self {
        EncodeError::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn write_failed(format: impl Into<String>, detail: impl Into<String>) -> Self {
        EncodeError::WriteFailed {
            format: format.into(),
            detail: detail.into(),
        }
    }
}

/// Pipeline-level error covering every stage of a composition run
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeError {
    Decode(DecodeError),
    Blend(BlendError),
    Encode(EncodeError),
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::Decode(e) => write!(f, "Decode stage failed: {}", e),
            ComposeError::Blend(e) => write!(f, "Blend stage failed: {}", e),
            ComposeError::Encode(e) => write!(f, "Encode stage failed: {}", e),
        }
    }
}

impl std::error::Error for ComposeError {}

impl ComposeError {
    /// The stage that produced the failure
    pub fn stage(&self) -> &'static str {
        match self {
            ComposeError::Decode(_) => "decode",
            ComposeError::Blend(_) => "blend",
            ComposeError::Encode(_) => "encode",
        }
    }

    /// Stable error kind of the underlying failure
    pub fn kind(&self) -> &'static str {
        match self {
            ComposeError::Decode(e) => e.kind(),
            ComposeError::Blend(e) => e.kind(),
            ComposeError::Encode(e) => e.kind(),
        }
    }
}

impl From<DecodeError> for ComposeError {
    fn from(e: DecodeError) -> Self {
        ComposeError::Decode(e)
    }
}

impl From<BlendError> for ComposeError {
    fn from(e: BlendError) -> Self {
        ComposeError::Blend(e)
    }
}

impl From<EncodeError> for ComposeError {
    fn from(e: EncodeError) -> Self {
        ComposeError::Encode(e)
    }
}
