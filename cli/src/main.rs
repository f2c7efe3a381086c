// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0

//! # llmbox CLI
//!
//! The `llmbox` binary drives the gateway's credential lifecycle from a shell.
//!
//! ## Commands
//!
//! - `llmbox config show|validate|generate` - Configuration management
//! - `llmbox token issue|watch` - IAM token operations against Yandex Cloud

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use llmbox_cli::commands::{self, ConfigCommand, TokenCommand};
use llmbox_core::domain::gateway_config::{GatewayConfigManifest, LoggingConfig};

/// llmbox - LLM gateway credential tooling
#[derive(Parser)]
#[command(name = "llmbox")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LLMBOX_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "LLMBOX_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// IAM token operations
    #[command(name = "token")]
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is the normal case outside local development
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Only the logging section matters here; commands report load errors themselves
    let mut logging = GatewayConfigManifest::load_or_default(cli.config.clone())
        .map(|config| config.logging())
        .unwrap_or_default();
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    init_logging(&logging)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Token { command }) => {
            commands::token::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
