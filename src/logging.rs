// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for structured logging
///
/// Installs a fmt subscriber that writes human-readable events to stdout.
/// The filter honors `RUST_LOG` when set and falls back to the provided
/// default level otherwise.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Examples
///
/// ```ignore
/// use tilemark::logging::init_subscriber;
///
/// init_subscriber("info").expect("Failed to initialize logging");
/// tracing::info!("engine started");
/// ```
pub fn init_subscriber(default_level: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).try_init()?;

    Ok(())
}
