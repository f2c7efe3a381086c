// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use llmbox_core::domain::gateway_config::GatewayConfigManifest;

const SAMPLE_CONFIG: &str = include_str!("../../templates/llmbox-config.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration (private key redacted)
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./llmbox-config.yaml)
        #[arg(short, long, default_value = "./llmbox-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(&output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = GatewayConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. LLMBOX_CONFIG_PATH: {}",
            std::env::var("LLMBOX_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./llmbox-config.yaml");
        println!("  4. ~/.llmbox/config.yaml");
        println!("  5. /etc/llmbox/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Deployment:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    let credentials = config.spec.credentials.redacted();
    println!("{}", "Credentials:".bold());
    println!("  Key ID: {}", display_or_unset(credentials.key_id.as_deref()));
    println!(
        "  Service account: {}",
        display_or_unset(credentials.service_account_id.as_deref())
    );
    println!(
        "  Private key: {}",
        display_or_unset(credentials.private_key.as_deref())
    );
    println!("  Token endpoint: {}", credentials.token_endpoint);
    println!("  Request timeout: {}s", credentials.request_timeout_seconds);
    println!(
        "  Lifetimes: assertion {}s, token {}s (buffer {}s)",
        credentials.assertion_lifetime_seconds,
        credentials.token_lifetime_seconds,
        credentials.expiry_buffer_seconds
    );
    println!();

    let renewal = &credentials.renewal;
    println!("{}", "Renewal:".bold());
    if renewal.enabled {
        println!("  Initial delay: {}s", renewal.initial_delay_seconds);
        println!("  Interval: {}s", renewal.interval_seconds);
        println!("  Retry base: {}s", renewal.retry_base_seconds);
    } else {
        println!("  {}", "disabled".yellow());
    }
    println!();

    let logging = config.logging();
    println!("{}", "Logging:".bold());
    println!("  Level: {}", logging.level);
    println!("  Format: {}", logging.format);
    println!();

    Ok(())
}

fn display_or_unset(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "(not set)".dimmed().to_string(),
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path) -> Result<()> {
    std::fs::write(output, SAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
