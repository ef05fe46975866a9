//! Recency gating: a slow, superseded run must never publish over the
//! result of newer inputs.

use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tilemark::config::EngineConfig;
use tilemark::decode::{DecodeLimits, ImageDecoder};
use tilemark::encode::CompositedImage;
use tilemark::fetch::{ByteSource, SourceError};
use tilemark::pipeline::{Compositor, PipelineState, WatermarkSpec};

fn png_bytes(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, color);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

/// Source whose fetch latency depends on the URL, to force the first
/// submission to finish after the second one.
struct DelayedSource {
    slow: bytes::Bytes,
    fast: bytes::Bytes,
}

#[async_trait::async_trait]
impl ByteSource for DelayedSource {
    async fn fetch(&self, url: &str) -> Result<bytes::Bytes, SourceError> {
        if url.contains("slow") {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(self.slow.clone())
        } else {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(self.fast.clone())
        }
    }
}

fn build_compositor() -> (Compositor, Arc<Mutex<Vec<CompositedImage>>>) {
    let source = DelayedSource {
        slow: bytes::Bytes::from(png_bytes(32, 32, Rgba([255, 0, 0, 255]))),
        fast: bytes::Bytes::from(png_bytes(32, 32, Rgba([0, 0, 255, 255]))),
    };
    let decoder = ImageDecoder::new(
        Arc::new(source),
        DecodeLimits::default(),
        10,
        Duration::from_secs(60),
    );
    let results: Arc<Mutex<Vec<CompositedImage>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_results = Arc::clone(&results);
    let sink = move |image: &CompositedImage| {
        sink_results.lock().push(image.clone());
    };
    let compositor = Compositor::new(decoder, &EngineConfig::default(), Arc::new(sink)).unwrap();
    (compositor, results)
}

// Test: submitting B while A's slow fetch is in flight drops A's result
#[tokio::test]
async fn test_stale_run_never_publishes() {
    let (compositor, results) = build_compositor();
    let spec = WatermarkSpec::new("@Brand", 0.5, false);

    let slow_handle = compositor
        .submit("https://img.test/slow.png", spec.clone())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let fast_handle = compositor
        .submit("https://img.test/fast.png", spec)
        .unwrap();

    fast_handle.await.unwrap();
    slow_handle.await.unwrap();

    // Only the newer submission published, and it stays published
    let published = results.lock();
    assert_eq!(published.len(), 1);
    assert_eq!(compositor.published_generation(), 2);
    assert_eq!(compositor.state(), PipelineState::Published);

    // Watermark disabled: pixels identify which source won
    let decoded = image::load_from_memory(&published[0].bytes)
        .unwrap()
        .to_rgba8();
    assert!(decoded.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
}

// Test: the stale drop keeps the newer result even when the slow run
// finishes last by a wide margin
#[tokio::test]
async fn test_last_published_matches_latest_input() {
    let (compositor, _) = build_compositor();
    let spec = WatermarkSpec::new("@Brand", 0.5, false);

    let slow_handle = compositor
        .submit("https://img.test/slow-large.png", spec.clone())
        .unwrap();
    let fast_handle = compositor
        .submit("https://img.test/fast-small.png", spec)
        .unwrap();

    slow_handle.await.unwrap();
    fast_handle.await.unwrap();

    let published = compositor.last_published().unwrap();
    let decoded = image::load_from_memory(&published.bytes).unwrap().to_rgba8();
    assert!(decoded.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
}

// Test: resubmitting the exact same inputs is a no-op
#[tokio::test]
async fn test_duplicate_inputs_not_rerun() {
    let (compositor, results) = build_compositor();
    let spec = WatermarkSpec::new("@Brand", 0.5, false);

    compositor
        .submit("https://img.test/fast.png", spec.clone())
        .unwrap()
        .await
        .unwrap();

    assert!(compositor.submit("https://img.test/fast.png", spec).is_none());
    assert_eq!(compositor.submitted_generation(), 1);
    assert_eq!(results.lock().len(), 1);
}
