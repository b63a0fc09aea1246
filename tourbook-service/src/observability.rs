//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over `service.log_level`. Production logs are JSON lines;
//! development logs are human readable.

use tracing_subscriber::EnvFilter;

use crate::{
    config::{Config, Environment},
    error::{Error, Result},
};

fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.service.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber; fails if one is already installed
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = env_filter(config);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.environment() {
        Environment::Production => builder.json().with_current_span(true).try_init(),
        Environment::Development => builder.with_target(false).try_init(),
    }
    .map_err(|e| Error::Internal(format!("Failed to initialize tracing: {e}")))?;

    tracing::info!(
        environment = %config.environment(),
        "Tracing initialized for service: {}", config.service.name
    );

    Ok(())
}
