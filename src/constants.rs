// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Decode safety limits
// =============================================================================

/// Maximum accepted encoded source size (50 MB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Maximum accepted source width or height
pub const DEFAULT_MAX_DIMENSION: u32 = 10_000;

/// Maximum accepted total pixel count (100 megapixels)
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// Watermark style defaults
// =============================================================================

/// Default watermark font size in pixels
pub const DEFAULT_FONT_SIZE_PX: u32 = 24;

/// Default tile stride as a multiple of the font size.
/// Sized so the stride lands near 1.8x the rendered width of a short label.
pub const DEFAULT_STRIDE_FACTOR: f32 = 12.0;

/// Default rotation applied uniformly to every placement, in degrees
pub const DEFAULT_ROTATION_DEGREES: f32 = -30.0;

/// Default watermark color (hex)
pub const DEFAULT_WATERMARK_COLOR: &str = "#FFFFFF";

// =============================================================================
// Output defaults
// =============================================================================

/// Default output encoding
pub const DEFAULT_OUTPUT_FORMAT: &str = "png";

/// Default JPEG quality (1-100)
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

// =============================================================================
// Fetch defaults
// =============================================================================

/// Default HTTP fetch timeout in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default decoded-source cache capacity (entries)
pub const DEFAULT_CACHE_ENTRIES: u64 = 100;

/// Default decoded-source cache TTL in seconds (1 hour)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
