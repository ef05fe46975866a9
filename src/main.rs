use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tilemark::config::EngineConfig;
use tilemark::decode::{DecodeLimits, ImageDecoder};
use tilemark::encode::CompositedImage;
use tilemark::fetch::HttpSource;
use tilemark::pipeline::{Compositor, WatermarkSpec};

/// Tilemark - deterministic tiled watermark compositing
#[derive(Parser, Debug)]
#[command(name = "tilemark")]
#[command(version, about, long_about = None)]
struct Args {
    /// Source image: http(s) URL, data URI, or file path
    input: String,

    /// Watermark text
    #[arg(short, long, default_value = "")]
    text: String,

    /// Watermark opacity (clamped to 0.0-1.0)
    #[arg(long, default_value_t = 0.5)]
    opacity: f32,

    /// Disable the watermark and pass the image through
    #[arg(long)]
    hide: bool,

    /// Output encoding: png, jpeg, or webp (overrides config)
    #[arg(short, long)]
    format: Option<String>,

    /// Write the encoded result here instead of printing a data URI
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tilemark::logging::init_subscriber(&args.log_level)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?,
        None => EngineConfig::default(),
    };
    if let Some(format) = &args.format {
        config.output.format = format.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    tracing::info!(
        format = %config.output.format,
        font_size_px = config.watermark.font_size_px,
        "configuration loaded"
    );

    let source = HttpSource::new(
        Duration::from_secs(config.fetch.timeout_seconds),
        config.fetch.max_image_bytes,
    )
    .context("failed to build HTTP source")?;
    let limits = DecodeLimits {
        max_image_bytes: config.fetch.max_image_bytes,
        ..DecodeLimits::default()
    };
    let decoder = ImageDecoder::new(
        Arc::new(source),
        limits,
        config.fetch.cache_entries,
        Duration::from_secs(config.fetch.cache_ttl_seconds),
    );

    let sink = |_: &CompositedImage| {};
    let compositor = Compositor::new(decoder, &config, Arc::new(sink))
        .map_err(|e| anyhow::anyhow!("failed to build compositor: {}", e))?;

    let spec = WatermarkSpec::new(args.text.clone(), args.opacity, !args.hide);
    let handle = compositor
        .submit(&args.input, spec)
        .context("submission rejected as a duplicate")?;
    handle.await.context("composition task panicked")?;

    if let Some(error) = compositor.last_error() {
        bail!(
            "composition failed at {} ({}): {}",
            error.stage(),
            error.kind(),
            error
        );
    }

    let published = compositor
        .last_published()
        .context("composition finished without a published result")?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &published.bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                bytes = published.bytes.len(),
                encoding = %published.encoding,
                "composition written"
            );
        }
        None => {
            println!("{}", published.to_data_uri());
        }
    }

    Ok(())
}
