// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0
//! Credential Manager
//!
//! Keeps a valid IAM bearer token available to any number of concurrent
//! callers. Tokens come from exchanging a locally signed assertion; both are
//! cached together and refreshed together.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Facade over the assertion signer, the token exchanger and the
//!   renewal scheduler
//!
//! # Concurrency
//!
//! Valid tokens are served from a read lock without waiting on any in-flight
//! refresh. Refreshes are single-flight: an async mutex serializes the
//! check-and-refresh sequence, and callers queued behind a successful refresh
//! reuse its result. The background renewal takes the same mutex and swaps new
//! credentials in only once the exchange has succeeded.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::renewal_scheduler::{CredentialRenewer, RenewalScheduler, RenewalSchedulerConfig};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::credentials::{
    AssertionSigner, BearerToken, CredentialError, CredentialPhase, CredentialPolicy,
    CredentialState, TokenExchanger, TokenSource,
};
use crate::domain::gateway_config::CredentialsConfig;
use crate::infrastructure::yandex::{IamTokenClient, JwtAssertionSigner};

#[derive(Debug, Clone, Copy)]
enum RefreshTrigger {
    Demand,
    Renewal,
}

impl RefreshTrigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::Demand => "demand",
            Self::Renewal => "renewal",
        }
    }
}

fn record_refresh(trigger: RefreshTrigger, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "llmbox_credential_refresh_total",
        "trigger" => trigger.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Shared refresh machinery, referenced by both the manager and its renewal task.
struct CredentialCore {
    signer: Arc<dyn AssertionSigner>,
    exchanger: Arc<dyn TokenExchanger>,
    clock: Arc<dyn Clock>,
    policy: CredentialPolicy,
    state: RwLock<CredentialState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl CredentialCore {
    fn cached_token(&self) -> Option<String> {
        let now = self.clock.now();
        self.state
            .read()
            .usable_token(now, self.policy.expiry_buffer)
            .map(|token| token.value.clone())
    }

    async fn current_or_refresh(&self) -> Result<String, CredentialError> {
        if let Some(token) = self.cached_token() {
            debug!("IAM token served from cache");
            return Ok(token);
        }

        let _refresh = self.refresh_lock.lock().await;

        // A refresh may have completed while this caller was queued
        if let Some(token) = self.cached_token() {
            debug!("IAM token served from concurrent refresh");
            return Ok(token);
        }

        let result = self.refresh_on_demand().await;
        record_refresh(RefreshTrigger::Demand, result.is_ok());
        if let Err(e) = &result {
            error!("Error getting IAM token, credentials reset: {}", e);
        }
        result
    }

    /// Re-sign only if the assertion went stale, then exchange. Caller holds `refresh_lock`.
    async fn refresh_on_demand(&self) -> Result<String, CredentialError> {
        let now = self.clock.now();
        let buffer = self.policy.expiry_buffer;

        let cached = self.state.read().usable_assertion(now, buffer).cloned();
        let assertion = match cached {
            Some(assertion) => assertion,
            None => {
                info!("Assertion expired or missing, signing a new one");
                let assertion = match self.signer.sign(now) {
                    Ok(assertion) => assertion,
                    Err(e) => {
                        self.state.write().reset();
                        return Err(e);
                    }
                };
                self.state.write().install_assertion(assertion.clone());
                assertion
            }
        };

        info!("IAM token expired or missing, exchanging assertion");
        match self.exchanger.exchange(&assertion).await {
            Ok(value) => {
                let expires_at = self.clock.now() + self.policy.token_lifetime;
                self.state
                    .write()
                    .install_token(BearerToken::new(value.clone(), expires_at));
                Ok(value)
            }
            Err(e) => {
                self.state.write().reset();
                Err(e.into())
            }
        }
    }

    /// Fresh assertion and fresh exchange, installed atomically. Caller holds `refresh_lock`.
    async fn refresh_forced(&self) -> Result<(), CredentialError> {
        let now = self.clock.now();
        let assertion = self.signer.sign(now)?;
        let value = self.exchanger.exchange(&assertion).await?;

        let expires_at = self.clock.now() + self.policy.token_lifetime;
        let mut state = self.state.write();
        state.install_assertion(assertion);
        state.install_token(BearerToken::new(value, expires_at));
        Ok(())
    }
}

#[async_trait]
impl CredentialRenewer for CredentialCore {
    async fn renew(&self) -> Result<(), CredentialError> {
        let _refresh = self.refresh_lock.lock().await;

        let result = self.refresh_forced().await;
        record_refresh(RefreshTrigger::Renewal, result.is_ok());
        if result.is_err() {
            self.state.write().reset();
        }
        result
    }
}

/// Credential lifecycle facade.
///
/// Construct once and share through an `Arc`; dropping the manager stops its
/// renewal task.
pub struct CredentialManager {
    core: Arc<CredentialCore>,
    renewal: RenewalSchedulerConfig,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    shutdown_token: CancellationToken,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager").finish_non_exhaustive()
    }
}

impl CredentialManager {
    pub fn new(
        signer: Arc<dyn AssertionSigner>,
        exchanger: Arc<dyn TokenExchanger>,
        clock: Arc<dyn Clock>,
        policy: CredentialPolicy,
        renewal: RenewalSchedulerConfig,
    ) -> Self {
        Self {
            core: Arc::new(CredentialCore {
                signer,
                exchanger,
                clock,
                policy,
                state: RwLock::new(CredentialState::default()),
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
            renewal,
            scheduler: Mutex::new(None),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Build a manager for Yandex Cloud from gateway configuration.
    ///
    /// Key material is resolved, normalized and test-signed here, so a broken
    /// key refuses to start instead of failing on the first request.
    pub fn from_config(config: &CredentialsConfig) -> anyhow::Result<Self> {
        let key = config.key_material()?;
        let policy = config.policy()?;

        let signer = JwtAssertionSigner::new(&key, policy.assertion_lifetime)?;
        let exchanger = IamTokenClient::new(config.token_endpoint.clone(), config.request_timeout())
            .map_err(CredentialError::from)?;

        info!(
            key_id = key.key_id(),
            service_account_id = key.issuer_id(),
            token_endpoint = %config.token_endpoint,
            "Credential manager initialized"
        );

        Ok(Self::new(
            Arc::new(signer),
            Arc::new(exchanger),
            Arc::new(SystemClock),
            policy,
            RenewalSchedulerConfig::from(&config.renewal),
        ))
    }

    /// Return a bearer token valid for at least the expiry buffer, refreshing
    /// the assertion and/or token when stale.
    pub async fn get_token(&self) -> Result<String, CredentialError> {
        let token = self.core.current_or_refresh().await?;
        self.ensure_renewal_started();
        Ok(token)
    }

    pub fn phase(&self) -> CredentialPhase {
        self.core.state.read().phase()
    }

    pub fn policy(&self) -> CredentialPolicy {
        self.core.policy
    }

    /// Expiry of the cached bearer token, if any.
    pub fn token_expires_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.core.state.read().token().map(|token| token.expires_at)
    }

    pub fn renewal_running(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the renewal task and wait for it to exit. Later `get_token` calls
    /// still work but never restart background renewal.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();

        let handle = self.scheduler.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Credential renewal task ended abnormally: {}", e);
            }
        }
        info!("Credential manager shut down");
    }

    fn ensure_renewal_started(&self) {
        if self.shutdown_token.is_cancelled() {
            return;
        }

        let mut slot = self.scheduler.lock();
        if slot.is_some() {
            return;
        }

        info!("Starting IAM token refresh task");
        let renewer: Arc<dyn CredentialRenewer> = self.core.clone();
        let scheduler = Arc::new(RenewalScheduler::new(
            renewer,
            self.renewal.clone(),
            self.shutdown_token.clone(),
        ));
        *slot = Some(scheduler.start());
    }
}

impl Drop for CredentialManager {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

#[async_trait]
impl TokenSource for CredentialManager {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        self.get_token().await
    }
}
