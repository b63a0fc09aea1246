use std::path::Path;

use anyhow::{Context, Result};
use tourbook_service::config::Config;

pub mod check_config;
pub mod serve;

/// Defaults, config files and `TOURBOOK_*` variables, plus `path` when given
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}
