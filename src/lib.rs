// Tilemark - deterministic tiled watermark compositing engine

pub mod blend;
pub mod config;
pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod fetch;
pub mod glyph;
pub mod logging;
pub mod pipeline;
pub mod tiles;

pub use blend::{blend, WatermarkStyle};
pub use config::EngineConfig;
pub use decode::{DecodeLimits, ImageDecoder, ImageReference, SourceImage};
pub use encode::{encode, CompositedImage, OutputFormat};
pub use error::{BlendError, ComposeError, DecodeError, EncodeError};
pub use fetch::{ByteSource, HttpSource, SourceError};
pub use glyph::Color;
pub use pipeline::{Compositor, PipelineState, ResultSink, WatermarkSpec};
pub use tiles::{compute_tiles, compute_tiles_with_rotation, Placement};
