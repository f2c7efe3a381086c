// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0

// Yandex Cloud IAM Token Exchange Adapter
//
// Anti-Corruption Layer for the IAM `tokens` endpoint: trades a signed
// service-account assertion for a short-lived IAM bearer token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::IAM_AUDIENCE;
use crate::domain::credentials::{ExchangeFailure, SignedAssertion, TokenExchanger};

pub const EXCHANGE_DURATION_METRIC: &str = "llmbox_token_exchange_seconds";

pub struct IamTokenClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct IamTokenRequest<'a> {
    jwt: &'a str,
}

#[derive(Deserialize)]
struct IamTokenResponse {
    #[serde(rename = "iamToken")]
    iam_token: Option<String>,
    #[serde(rename = "expiresAt")]
    expires_at: Option<String>,
}

impl IamTokenClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExchangeFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeFailure::Transport(Box::new(e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Client for the public IAM endpoint with the default 30 second timeout.
    pub fn yandex_cloud() -> Result<Self, ExchangeFailure> {
        Self::new(IAM_AUDIENCE, Duration::from_secs(30))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl IamTokenClient {
    /// POST the assertion and read the whole response body.
    async fn post_assertion(
        &self,
        assertion: &SignedAssertion,
    ) -> Result<(reqwest::StatusCode, String), ExchangeFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&IamTokenRequest {
                jwt: &assertion.value,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = %self.endpoint, "IAM token request failed: {}", e);
                ExchangeFailure::Transport(Box::new(e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeFailure::Transport(Box::new(e)))?;

        Ok((status, body))
    }
}

#[async_trait]
impl TokenExchanger for IamTokenClient {
    async fn exchange(&self, assertion: &SignedAssertion) -> Result<String, ExchangeFailure> {
        let started = Instant::now();
        let outcome = self.post_assertion(assertion).await;
        metrics::histogram!(EXCHANGE_DURATION_METRIC).record(started.elapsed().as_secs_f64());

        let (status, body) = outcome?;

        if status != reqwest::StatusCode::OK {
            tracing::error!(
                status = status.as_u16(),
                response = %body,
                "IAM token creation failed"
            );
            return Err(ExchangeFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: IamTokenResponse = serde_json::from_str(&body)
            .map_err(|e| ExchangeFailure::MalformedResponse(format!("invalid JSON: {}", e)))?;

        let token = parsed
            .iam_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExchangeFailure::MalformedResponse("response has no iamToken".into()))?;

        tracing::debug!(
            server_expires_at = parsed.expires_at.as_deref().unwrap_or("unknown"),
            "IAM token issued"
        );

        Ok(token)
    }
}
