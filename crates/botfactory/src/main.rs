// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Botfactory - AI chatbots across messaging platforms.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod metrics_setup;
mod platforms;
mod serve;

use std::path::PathBuf;

use botfactory_config::BotFactoryConfig;
use clap::{Parser, Subcommand};

/// Botfactory - AI chatbots across messaging platforms.
#[derive(Parser, Debug)]
#[command(name = "botfactory", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the supervisor and the admin gateway until interrupted.
    Serve,
    /// Validate the configuration and print the effective values.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => botfactory_config::load_and_validate_path(path),
        None => botfactory_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            botfactory_config::render_errors(&errors);
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
        Some(Commands::Config) => match botfactory_config::to_toml(&redacted(config)) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                botfactory_config::render_errors(&[e]);
                std::process::exit(1);
            }
        },
        None => {
            println!("botfactory: use --help for available commands");
        }
    }
}

/// Masks secrets before the configuration is printed.
fn redacted(mut config: BotFactoryConfig) -> BotFactoryConfig {
    const MASK: &str = "[redacted]";
    if config.ai.api_key.is_some() {
        config.ai.api_key = Some(MASK.to_string());
    }
    if config.gateway.bearer_token.is_some() {
        config.gateway.bearer_token = Some(MASK.to_string());
    }
    config
}
