//! Compositing orchestrator.
//!
//! Drives the decode → blend → encode pipeline as an explicit state
//! machine and publishes each completed composition to a caller-supplied
//! sink. Publishing is gated on input recency: when inputs change while a
//! run is still in flight, the superseded run's result is dropped so a
//! slow, stale composition can never overwrite a newer one.
//!
//! State machine:
//! - **Idle**: waiting for the first input
//! - **Decoding**: resolving and decoding the source reference
//! - **Blending**: stamping the watermark overlay (bypassed when disabled)
//! - **Encoding**: serializing the composited buffer
//! - **Published**: latest result delivered to the sink
//! - **Error**: the latest run failed; a new input self-heals

use crate::blend::{blend, WatermarkStyle};
use crate::config::EngineConfig;
use crate::decode::ImageDecoder;
use crate::encode::{encode, CompositedImage, OutputFormat};
use crate::error::ComposeError;
use crate::glyph::Color;
use crate::tiles::compute_tiles_with_rotation;
use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Caller-supplied watermark parameters.
///
/// A value type compared structurally: resubmitting an equal spec with an
/// unchanged source triggers no recomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSpec {
    text: String,
    opacity: f32,
    enabled: bool,
}

impl WatermarkSpec {
    /// Create a spec. Opacity is clamped to [0, 1]; non-finite values
    /// collapse to 0.
    pub fn new(text: impl Into<String>, opacity: f32, enabled: bool) -> Self {
        let opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            text: text.into(),
            opacity,
            enabled,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Content-derived fingerprint of the spec.
    ///
    /// Hashes the exact opacity bits, so equal fingerprints mean equal
    /// composition inputs and there is no clock or randomness involved.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.opacity.to_bits().to_be_bytes());
        hasher.update([self.enabled as u8]);
        hex::encode(hasher.finalize())
    }
}

/// Pipeline states for a composition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Decoding = 1,
    Blending = 2,
    Encoding = 3,
    Published = 4,
    Error = 5,
}

impl From<u8> for PipelineState {
    fn from(value: u8) -> Self {
        match value {
            0 => PipelineState::Idle,
            1 => PipelineState::Decoding,
            2 => PipelineState::Blending,
            3 => PipelineState::Encoding,
            4 => PipelineState::Published,
            5 => PipelineState::Error,
            _ => PipelineState::Idle,
        }
    }
}

/// Receiver for published compositions.
///
/// Invoked exactly once per published composition, always with the result
/// of the most recent inputs.
pub trait ResultSink: Send + Sync {
    fn on_processed(&self, image: &CompositedImage);
}

impl<F> ResultSink for F
where
    F: Fn(&CompositedImage) + Send + Sync,
{
    fn on_processed(&self, image: &CompositedImage) {
        self(image)
    }
}

/// Style and encoding settings resolved once from the validated config.
#[derive(Debug, Clone)]
struct RenderSettings {
    style: WatermarkStyle,
    stride_factor: f32,
    rotation_degrees: f32,
    format: OutputFormat,
    jpeg_quality: u8,
}

/// Compositing orchestrator.
///
/// Cloning is cheap and clones share all state, so a clone can be moved
/// into a spawned task while the caller keeps observing the pipeline.
#[derive(Clone)]
pub struct Compositor {
    decoder: ImageDecoder,
    settings: Arc<RenderSettings>,
    sink: Arc<dyn ResultSink>,
    state: Arc<AtomicU8>,
    /// Generation of the most recently submitted inputs
    submitted: Arc<AtomicU64>,
    /// Generation of the most recently published result (monotonic)
    published: Arc<AtomicU64>,
    last_input: Arc<Mutex<Option<(String, WatermarkSpec)>>>,
    last_error: Arc<Mutex<Option<ComposeError>>>,
    last_published: Arc<Mutex<Option<CompositedImage>>>,
}

impl Compositor {
    /// Create an orchestrator from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation message if the configuration is invalid.
    pub fn new(
        decoder: ImageDecoder,
        config: &EngineConfig,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, String> {
        config.validate()?;

        let settings = RenderSettings {
            style: WatermarkStyle {
                font_size_px: config.watermark.font_size_px,
                color: Color::from_hex(&config.watermark.color)?,
            },
            stride_factor: config.watermark.stride_factor,
            rotation_degrees: config.watermark.rotation_degrees,
            format: config.output.format.parse().map_err(|e| format!("{}", e))?,
            jpeg_quality: config.output.jpeg_quality,
        };

        Ok(Self {
            decoder,
            settings: Arc::new(settings),
            sink,
            state: Arc::new(AtomicU8::new(PipelineState::Idle as u8)),
            submitted: Arc::new(AtomicU64::new(0)),
            published: Arc::new(AtomicU64::new(0)),
            last_input: Arc::new(Mutex::new(None)),
            last_error: Arc::new(Mutex::new(None)),
            last_published: Arc::new(Mutex::new(None)),
        })
    }

    /// Current pipeline state.
    pub fn state(&self) -> PipelineState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Generation of the most recently submitted inputs.
    pub fn submitted_generation(&self) -> u64 {
        self.submitted.load(Ordering::Acquire)
    }

    /// Generation of the most recently published result.
    pub fn published_generation(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    /// Error of the most recent failed run, if any.
    pub fn last_error(&self) -> Option<ComposeError> {
        self.last_error.lock().clone()
    }

    /// Most recently published composition, if any.
    pub fn last_published(&self) -> Option<CompositedImage> {
        self.last_published.lock().clone()
    }

    /// Submit a new input combination.
    ///
    /// Spawns the composition run and returns its join handle. Returns
    /// `None` when the inputs equal the last accepted submission: there is
    /// no re-run and no re-publish, which also means a failed input is
    /// never retried until a different input arrives.
    pub fn submit(&self, image_url: &str, spec: WatermarkSpec) -> Option<JoinHandle<()>> {
        {
            let mut last = self.last_input.lock();
            if last
                .as_ref()
                .is_some_and(|(url, s)| url == image_url && *s == spec)
            {
                tracing::debug!(image_url, "duplicate submission ignored");
                return None;
            }
            *last = Some((image_url.to_string(), spec.clone()));
        }

        let generation = self.submitted.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(generation, image_url, "composition submitted");

        let this = self.clone();
        let url = image_url.to_string();
        Some(tokio::spawn(async move {
            this.run(generation, url, spec).await;
        }))
    }

    /// One end-to-end composition run for a specific generation.
    async fn run(&self, generation: u64, url: String, spec: WatermarkSpec) {
        let started = Instant::now();

        // A cache hit skips the decoding state entirely: only the spec
        // changed and the source pixels are already in memory.
        let source = match self.decoder.cached(&url).await {
            Some(source) => {
                tracing::debug!(generation, "source cache hit, skipping decode stage");
                source
            }
            None => {
                self.transition(generation, PipelineState::Decoding);
                match self.decoder.decode(&url).await {
                    Ok(source) => source,
                    Err(e) => {
                        self.fail(generation, e.into());
                        return;
                    }
                }
            }
        };

        tokio::task::yield_now().await;
        if self.is_superseded(generation) {
            tracing::debug!(generation, "dropping superseded run after decode");
            return;
        }

        self.transition(generation, PipelineState::Blending);
        let width = source.width();
        let height = source.height();
        let pixels = if spec.enabled() && !spec.text().is_empty() {
            let placements = compute_tiles_with_rotation(
                width,
                height,
                spec.text(),
                self.settings.style.font_size_px,
                self.settings.stride_factor,
                self.settings.rotation_degrees,
            );
            match blend(
                &source,
                &placements,
                spec.text(),
                spec.opacity(),
                &self.settings.style,
            ) {
                Ok(pixels) => pixels,
                Err(e) => {
                    self.fail(generation, e.into());
                    return;
                }
            }
        } else {
            // Disabled watermark bypasses the blend: the output must be
            // pixel-identical to the re-encoded source
            source.to_rgba()
        };

        tokio::task::yield_now().await;
        if self.is_superseded(generation) {
            tracing::debug!(generation, "dropping superseded run after blend");
            return;
        }

        self.transition(generation, PipelineState::Encoding);
        let bytes = match encode(
            pixels.as_raw(),
            width,
            height,
            self.settings.format,
            self.settings.jpeg_quality,
        ) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail(generation, e.into());
                return;
            }
        };

        let image = CompositedImage {
            encoding: self.settings.format,
            bytes: Bytes::from(bytes),
            source_image_id: source.id().to_string(),
            spec_fingerprint: spec.fingerprint(),
        };

        self.publish(generation, image, started);
    }

    /// Deliver a completed composition, gated on recency.
    ///
    /// The generation check, register write, and sink dispatch all happen
    /// under the `last_published` lock, so a slower run that passes the
    /// check cannot interleave with a newer run's publish and land its
    /// stale result afterwards.
    fn publish(&self, generation: u64, image: CompositedImage, started: Instant) {
        let mut last = self.last_published.lock();

        if self.is_superseded(generation) {
            tracing::debug!(generation, "dropping superseded result before publish");
            return;
        }

        // Monotonic watermark: the published generation only moves forward.
        let prev = self.published.load(Ordering::Acquire);
        if generation <= prev {
            tracing::debug!(
                generation,
                published = prev,
                "dropping result older than the published generation"
            );
            return;
        }
        self.published.store(generation, Ordering::Release);

        *last = Some(image.clone());
        self.transition(generation, PipelineState::Published);

        tracing::info!(
            generation,
            encoding = %image.encoding,
            bytes = image.bytes.len(),
            source_image_id = %image.source_image_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "composition published"
        );

        self.sink.on_processed(&image);
    }

    /// Record a failed run. Superseded failures are dropped silently so an
    /// old run cannot flip the pipeline into Error after newer inputs
    /// arrived.
    fn fail(&self, generation: u64, error: ComposeError) {
        if self.is_superseded(generation) {
            tracing::debug!(generation, "dropping superseded failure");
            return;
        }

        tracing::warn!(
            generation,
            stage = error.stage(),
            kind = error.kind(),
            %error,
            "composition run failed"
        );

        *self.last_error.lock() = Some(error);
        self.transition(generation, PipelineState::Error);
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.submitted.load(Ordering::Acquire) != generation
    }

    /// Move the state register, unless the generation has been superseded.
    /// A stale run must never leave the register mid-flight after a newer
    /// run already settled it.
    fn transition(&self, generation: u64, state: PipelineState) {
        if self.is_superseded(generation) {
            tracing::debug!(generation, state = ?state, "skipping superseded transition");
            return;
        }
        self.state.store(state as u8, Ordering::Release);
        tracing::debug!(state = ?state, "pipeline state transition");
    }
}
