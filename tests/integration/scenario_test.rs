//! End-to-end pipeline scenarios: submit an image reference plus a
//! watermark spec and check the published composition pixel by pixel.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
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

fn data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}

struct UnusedSource;

#[async_trait::async_trait]
impl ByteSource for UnusedSource {
    async fn fetch(&self, url: &str) -> Result<bytes::Bytes, SourceError> {
        panic!("no network fetch expected for {}", url);
    }
}

fn build_compositor() -> (Compositor, Arc<Mutex<Vec<CompositedImage>>>) {
    let decoder = ImageDecoder::new(
        Arc::new(UnusedSource),
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

async fn compose(compositor: &Compositor, reference: &str, spec: WatermarkSpec) -> RgbaImage {
    compositor
        .submit(reference, spec)
        .expect("submission accepted")
        .await
        .unwrap();
    let published = compositor.last_published().expect("published result");
    image::load_from_memory(&published.bytes).unwrap().to_rgba8()
}

// Test: visible watermark marks pixels across the whole canvas, untouched
// pixels stay exactly the source color
#[tokio::test]
async fn test_visible_watermark_covers_canvas() {
    let (compositor, _) = build_compositor();
    let reference = data_uri(&png_bytes(800, 800, Rgba([255, 0, 0, 255])));

    let out = compose(
        &compositor,
        &reference,
        WatermarkSpec::new("@Brand", 0.6, true),
    )
    .await;
    assert_eq!((out.width(), out.height()), (800, 800));

    // Count changed pixels per quadrant; the tile grid must reach all four
    let mut quadrants = [0usize; 4];
    let mut changed = 0usize;
    for (x, y, pixel) in out.enumerate_pixels() {
        if *pixel == Rgba([255, 0, 0, 255]) {
            continue;
        }
        changed += 1;
        let q = (y >= 400) as usize * 2 + (x >= 400) as usize;
        quadrants[q] += 1;

        // White over pure red: red channel stays saturated, G and B lift equally
        assert_eq!(pixel[0], 255);
        assert_eq!(pixel[1], pixel[2]);
        assert_eq!(pixel[3], 255);
    }

    assert!(changed > 0, "watermark must mark pixels");
    for (i, count) in quadrants.iter().enumerate() {
        assert!(*count > 0, "quadrant {} untouched by the tile grid", i);
    }
}

// Test: hidden watermark publishes the source pixels unchanged
#[tokio::test]
async fn test_hidden_watermark_is_pixel_identical() {
    let (compositor, _) = build_compositor();
    let reference = data_uri(&png_bytes(200, 160, Rgba([10, 140, 30, 255])));

    let out = compose(
        &compositor,
        &reference,
        WatermarkSpec::new("@Brand", 0.6, false),
    )
    .await;

    assert!(out.pixels().all(|p| *p == Rgba([10, 140, 30, 255])));
    assert_eq!(compositor.state(), PipelineState::Published);
}

// Test: zero opacity and a hidden watermark publish identical bytes
#[tokio::test]
async fn test_zero_opacity_matches_hidden() {
    let source = png_bytes(300, 300, Rgba([50, 50, 200, 255]));
    let reference = data_uri(&source);

    let (compositor_a, _) = build_compositor();
    compositor_a
        .submit(&reference, WatermarkSpec::new("@Brand", 0.0, true))
        .unwrap()
        .await
        .unwrap();

    let (compositor_b, _) = build_compositor();
    compositor_b
        .submit(&reference, WatermarkSpec::new("@Brand", 0.6, false))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(
        compositor_a.last_published().unwrap().bytes,
        compositor_b.last_published().unwrap().bytes
    );
}

// Test: the whole pipeline is a pure function of its inputs
#[tokio::test]
async fn test_pipeline_purity() {
    let reference = data_uri(&png_bytes(400, 250, Rgba([255, 255, 0, 255])));
    let spec = WatermarkSpec::new("watermark", 0.35, true);

    let mut published = Vec::new();
    for _ in 0..3 {
        let (compositor, _) = build_compositor();
        compositor
            .submit(&reference, spec.clone())
            .unwrap()
            .await
            .unwrap();
        published.push(compositor.last_published().unwrap());
    }

    assert_eq!(published[0].bytes, published[1].bytes);
    assert_eq!(published[1].bytes, published[2].bytes);
    assert_eq!(published[0].source_image_id, published[2].source_image_id);
    assert_eq!(published[0].spec_fingerprint, published[2].spec_fingerprint);
}

// Test: a failed run reports its stage and kind, and the next valid input
// recovers without rebuilding the orchestrator
#[tokio::test]
async fn test_failure_then_recovery() {
    let (compositor, results) = build_compositor();

    let bad = data_uri(b"not an image at all");
    compositor
        .submit(&bad, WatermarkSpec::new("@Brand", 0.6, true))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(compositor.state(), PipelineState::Error);
    let error = compositor.last_error().unwrap();
    assert_eq!(error.stage(), "decode");
    assert_eq!(error.kind(), "unreadable");
    assert!(results.lock().is_empty());

    let good = data_uri(&png_bytes(120, 120, Rgba([0, 0, 0, 255])));
    compositor
        .submit(&good, WatermarkSpec::new("@Brand", 0.6, true))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(compositor.state(), PipelineState::Published);
    assert_eq!(results.lock().len(), 1);
}

// Test: published metadata ties the result back to source and spec
#[tokio::test]
async fn test_published_metadata() {
    let (compositor, _) = build_compositor();
    let reference = data_uri(&png_bytes(64, 64, Rgba([255, 0, 0, 255])));
    let spec = WatermarkSpec::new("@Brand", 0.6, true);
    let fingerprint = spec.fingerprint();

    compositor.submit(&reference, spec).unwrap().await.unwrap();

    let published = compositor.last_published().unwrap();
    assert_eq!(published.spec_fingerprint, fingerprint);
    assert_eq!(published.source_image_id.len(), 64);
    assert!(published.to_data_uri().starts_with("data:image/png;base64,"));
}
