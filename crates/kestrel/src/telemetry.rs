//! Logging bootstrap.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::LoopError;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_filter`; an unparsable filter falls back to
/// `info`.
///
/// # Errors
///
/// [`LoopError::Logging`] if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), LoopError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|error| LoopError::Logging(error.to_string()))?;

    tracing::debug!(
        target: "telemetry",
        "Logging initialised (default filter: {})",
        default_filter
    );
    Ok(())
}
