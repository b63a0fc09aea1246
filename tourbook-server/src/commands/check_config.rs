use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use super::load_config;

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;

    println!("{}", "Effective configuration".bold());
    println!();
    println!("{rendered}");
    println!(
        "{} {} on port {} ({})",
        "✓".green().bold(),
        config.service.name,
        config.service.port,
        config.environment()
    );
    Ok(())
}
