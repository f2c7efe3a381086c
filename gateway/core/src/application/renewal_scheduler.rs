// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0
//! Credential Renewal Scheduler - Background task for proactive token renewal
//!
//! Renews the assertion and bearer token ahead of expiry so foreground callers
//! rarely pay for the network exchange. Failures never stop the loop: they are
//! logged, the renewer resets its cache, and the next attempt is scheduled with
//! capped exponential backoff.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Owns the renewal cadence; the refresh itself lives behind
//!   [`CredentialRenewer`]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::credentials::CredentialError;
use crate::domain::gateway_config::RenewalConfig;

/// Performs one forced renewal (fresh assertion and fresh exchange).
#[async_trait]
pub trait CredentialRenewer: Send + Sync {
    async fn renew(&self) -> Result<(), CredentialError>;
}

/// Configuration for the renewal scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalSchedulerConfig {
    /// Whether background renewal runs at all
    pub enabled: bool,

    /// Delay before the first renewal
    pub initial_delay: Duration,

    /// Delay between successful renewals
    pub interval: Duration,

    /// First retry delay after a failure; doubles per consecutive failure up to `interval`
    pub retry_base: Duration,
}

impl Default for RenewalSchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(3000),
            interval: Duration::from_secs(3000),
            retry_base: Duration::from_secs(30),
        }
    }
}

impl From<&RenewalConfig> for RenewalSchedulerConfig {
    fn from(config: &RenewalConfig) -> Self {
        Self {
            enabled: config.enabled,
            initial_delay: Duration::from_secs(config.initial_delay_seconds),
            interval: Duration::from_secs(config.interval_seconds),
            retry_base: Duration::from_secs(config.retry_base_seconds),
        }
    }
}

impl RenewalSchedulerConfig {
    /// Delay before the next attempt after `consecutive_failures` failed ones.
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.interval;
        }
        let exponent = (consecutive_failures - 1).min(16);
        self.retry_base
            .saturating_mul(1u32 << exponent)
            .min(self.interval)
    }
}

/// Credential renewal background task
pub struct RenewalScheduler {
    renewer: Arc<dyn CredentialRenewer>,
    config: RenewalSchedulerConfig,
    shutdown_token: CancellationToken,
}

impl RenewalScheduler {
    pub fn new(
        renewer: Arc<dyn CredentialRenewer>,
        config: RenewalSchedulerConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            renewer,
            config,
            shutdown_token,
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the renewal background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Credential renewal is disabled");
            return;
        }

        info!(
            initial_delay_seconds = self.config.initial_delay.as_secs(),
            interval_seconds = self.config.interval.as_secs(),
            retry_base_seconds = self.config.retry_base.as_secs(),
            "Starting credential renewal background task"
        );

        let mut delay = self.config.initial_delay;
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    debug!("Running credential renewal cycle");

                    let outcome = tokio::select! {
                        outcome = self.renewer.renew() => outcome,
                        _ = self.shutdown_token.cancelled() => {
                            info!("Shutdown signal received during renewal, stopping");
                            break;
                        }
                    };

                    match outcome {
                        Ok(()) => {
                            consecutive_failures = 0;
                            info!("Tokens refreshed successfully");
                        }
                        Err(e) => {
                            consecutive_failures = consecutive_failures.saturating_add(1);
                            error!(
                                consecutive_failures,
                                "Error refreshing tokens, credentials reset: {}", e
                            );
                        }
                    }

                    delay = self.config.next_delay(consecutive_failures);
                    debug!(next_attempt_seconds = delay.as_secs(), "Next credential renewal scheduled");
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping credential renewal");
                    break;
                }
            }
        }

        info!("Credential renewal background task stopped");
    }
}
