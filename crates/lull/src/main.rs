// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lull - message debouncing for conversational agents.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lull_config::{ConfigError, LullConfig};

/// Lull - message debouncing for conversational agents.
#[derive(Parser, Debug)]
#[command(name = "lull", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the debounce engine, notifier, and webhook gateway.
    Serve,
    /// Validate configuration and print a summary.
    CheckConfig,
}

fn load(path: Option<&std::path::Path>) -> Result<LullConfig, Vec<ConfigError>> {
    match path {
        Some(path) => lull_config::load_and_validate_path(path),
        None => lull_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            lull_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!("{}", check::summary(&config));
        }
        None => {
            println!("lull: use --help for available commands");
        }
    }
}
