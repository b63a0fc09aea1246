use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

mod app;
mod commands;
mod resources;
mod seed;

/// tourbook - tour booking REST API
#[derive(Parser)]
#[command(name = "tourbook")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file layered over the default sources
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(long, short)]
        port: Option<u16>,

        /// Directory of `{collection}.json` files to import at startup
        #[arg(long, value_name = "DIR")]
        seed_dir: Option<PathBuf>,
    },
    /// Print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Execute command
    let result = match cli.command {
        Commands::Serve { port, seed_dir } => {
            commands::serve::execute(cli.config, port, seed_dir).await
        }
        Commands::CheckConfig => commands::check_config::execute(cli.config),
    };

    // Handle result
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            // Show context if available
            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
