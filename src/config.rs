// Configuration module

use crate::constants::{
    DEFAULT_CACHE_ENTRIES, DEFAULT_CACHE_TTL_SECS, DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_FONT_SIZE_PX, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_OUTPUT_FORMAT,
    DEFAULT_ROTATION_DEGREES, DEFAULT_STRIDE_FACTOR, DEFAULT_WATERMARK_COLOR,
};
use crate::encode::OutputFormat;
use crate::glyph::Color;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration: watermark style, output encoding, and fetch limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub watermark: WatermarkConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_font_size_px() -> u32 {
    DEFAULT_FONT_SIZE_PX
}

fn default_stride_factor() -> f32 {
    DEFAULT_STRIDE_FACTOR
}

fn default_rotation_degrees() -> f32 {
    DEFAULT_ROTATION_DEGREES
}

fn default_color() -> String {
    DEFAULT_WATERMARK_COLOR.to_string()
}

/// Watermark style section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatermarkConfig {
    /// Rendered text height in pixels
    #[serde(default = "default_font_size_px")]
    pub font_size_px: u32,

    /// Tile stride as a multiple of the font size
    #[serde(default = "default_stride_factor")]
    pub stride_factor: f32,

    /// Uniform rotation applied to every placement, in degrees
    #[serde(default = "default_rotation_degrees")]
    pub rotation_degrees: f32,

    /// Text color as #RGB or #RRGGBB hex
    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            font_size_px: default_font_size_px(),
            stride_factor: default_stride_factor(),
            rotation_degrees: default_rotation_degrees(),
            color: default_color(),
        }
    }
}

fn default_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

/// Output encoding section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Output encoding name: png, jpeg, or webp
    #[serde(default = "default_format")]
    pub format: String,

    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_max_image_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

fn default_cache_entries() -> u64 {
    DEFAULT_CACHE_ENTRIES
}

fn default_cache_ttl_seconds() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

/// Source fetch section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum accepted encoded source size in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Decoded-source cache capacity in entries
    #[serde(default = "default_cache_entries")]
    pub cache_entries: u64,

    /// Decoded-source cache TTL in seconds
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_image_bytes: default_max_image_bytes(),
            cache_entries: default_cache_entries(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        // Now perform the substitution (we know all vars exist)
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap() // Safe because we checked above
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.watermark.font_size_px == 0 {
            return Err("watermark.font_size_px must be greater than 0".to_string());
        }

        if !self.watermark.stride_factor.is_finite() || self.watermark.stride_factor <= 0.0 {
            return Err(format!(
                "watermark.stride_factor must be a positive number, got {}",
                self.watermark.stride_factor
            ));
        }

        if !self.watermark.rotation_degrees.is_finite() {
            return Err("watermark.rotation_degrees must be a finite number".to_string());
        }

        Color::from_hex(&self.watermark.color)
            .map_err(|e| format!("watermark.color '{}' is invalid: {}", self.watermark.color, e))?;

        self.output
            .format
            .parse::<OutputFormat>()
            .map_err(|e| e.to_string())?;

        if self.output.jpeg_quality == 0 || self.output.jpeg_quality > 100 {
            return Err(format!(
                "output.jpeg_quality must be between 1 and 100, got {}",
                self.output.jpeg_quality
            ));
        }

        if self.fetch.timeout_seconds == 0 {
            return Err("fetch.timeout_seconds must be greater than 0".to_string());
        }

        if self.fetch.max_image_bytes == 0 {
            return Err("fetch.max_image_bytes must be greater than 0".to_string());
        }

        if self.fetch.cache_entries == 0 {
            return Err("fetch.cache_entries must be greater than 0".to_string());
        }

        Ok(())
    }
}
