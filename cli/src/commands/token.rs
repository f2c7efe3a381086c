// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0

//! IAM token commands
//!
//! Commands: issue, watch

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use llmbox_core::domain::gateway_config::GatewayConfigManifest;
use llmbox_core::CredentialManager;

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Fetch one bearer token and print it
    Issue {
        /// Print the full token instead of a masked preview
        #[arg(long)]
        reveal: bool,
    },

    /// Keep credentials renewed in the background until Ctrl-C
    Watch {
        /// Seconds between status lines
        #[arg(long, default_value = "60")]
        status_interval: u64,
    },
}

pub async fn handle_command(command: TokenCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let manager = CredentialManager::from_config(&config.spec.credentials)
        .context("Failed to initialize credential manager")?;

    let result = match command {
        TokenCommand::Issue { reveal } => issue(&manager, reveal).await,
        TokenCommand::Watch { status_interval } => {
            watch(&manager, Duration::from_secs(status_interval.max(1))).await
        }
    };

    manager.shutdown().await;
    result
}

async fn issue(manager: &CredentialManager, reveal: bool) -> Result<()> {
    let token = manager
        .get_token()
        .await
        .context("Failed to obtain IAM token")?;

    println!("{}", "✓ IAM token issued".green());
    if reveal {
        println!("{}", token);
    } else {
        println!("  Token: {}", mask_token(&token));
    }
    print_expiry(manager);

    Ok(())
}

async fn watch(manager: &CredentialManager, status_interval: Duration) -> Result<()> {
    manager
        .get_token()
        .await
        .context("Failed to obtain initial IAM token")?;

    println!("{}", "✓ IAM token issued, background renewal running".green());
    print_expiry(manager);
    println!("{}", "Press Ctrl-C to stop".dimmed());

    let mut ticker = tokio::time::interval(status_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Interrupt received, stopping credential renewal");
                break;
            }
            _ = ticker.tick() => {
                println!(
                    "  Phase: {:?}, renewal running: {}",
                    manager.phase(),
                    manager.renewal_running()
                );
                print_expiry(manager);
            }
        }
    }

    Ok(())
}

fn print_expiry(manager: &CredentialManager) {
    if let Some(expires_at) = manager.token_expires_at() {
        let remaining = expires_at - Utc::now();
        println!(
            "  Expires at: {} ({}s remaining)",
            expires_at.to_rfc3339(),
            remaining.num_seconds().max(0)
        );
    }
}

/// Keep a short prefix and suffix of a token, enough to tell tokens apart.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
