// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeDelta, Utc};
use llmbox_core::application::RenewalSchedulerConfig;
use llmbox_core::domain::gateway_config::CredentialsConfig;
use llmbox_core::infrastructure::yandex::{AssertionClaims, IamTokenClient, JwtAssertionSigner, IAM_AUDIENCE};
use llmbox_core::{
    CredentialError, CredentialManager, CredentialPhase, CredentialPolicy, ExchangeFailure,
    KeyMaterial, ManualClock,
};
use mockito::{Matcher, ServerGuard};
use std::sync::Arc;
use std::time::Duration;

const TEST_RSA_PRIVATE_PEM: &str = include_str!("fixtures/test_rsa_private.pem");
const TOKENS_PATH: &str = "/iam/v1/tokens";
const T0: i64 = 1_700_000_000;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Body matcher for a POST carrying an assertion issued by `iss` at `iat`.
///
/// The claims segment of a JWT is deterministic, so it can be matched exactly
/// even though the PS256 signature is randomized.
fn assertion_issued(iss: &str, iat: i64) -> Matcher {
    let claims = AssertionClaims {
        aud: IAM_AUDIENCE.to_string(),
        iss: iss.to_string(),
        iat,
        exp: iat + 3600,
    };
    let segment = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    Matcher::Regex(format!(r#"^\{{"jwt":"[A-Za-z0-9_-]+\.{}\.[A-Za-z0-9_-]+"\}}$"#, segment))
}

fn manager_for(server: &ServerGuard, clock: &ManualClock) -> CredentialManager {
    let key = KeyMaterial::new("k1", "sa1", TEST_RSA_PRIVATE_PEM).unwrap();
    let policy = CredentialPolicy::default();
    let signer = JwtAssertionSigner::new(&key, policy.assertion_lifetime).unwrap();
    let client = IamTokenClient::new(
        format!("{}{}", server.url(), TOKENS_PATH),
        Duration::from_secs(5),
    )
    .unwrap();

    CredentialManager::new(
        Arc::new(signer),
        Arc::new(client),
        Arc::new(clock.clone()),
        policy,
        RenewalSchedulerConfig::default(),
    )
}

#[tokio::test]
async fn test_token_lifecycle_against_stub_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let clock = ManualClock::new(at(T0));
    let manager = manager_for(&server, &clock);

    let first = server
        .mock("POST", TOKENS_PATH)
        .match_header("content-type", "application/json")
        .match_body(assertion_issued("sa1", T0))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"iamToken": "tok1", "expiresAt": "2023-11-14T23:13:20Z"}"#)
        .expect(1)
        .create_async()
        .await;

    assert_eq!(manager.get_token().await.unwrap(), "tok1");
    assert_eq!(manager.get_token().await.unwrap(), "tok1");
    first.assert_async().await;

    // Within 60s of the assertion's expiry: re-sign and re-exchange, even
    // though the token's own window has not fully elapsed
    clock.advance(TimeDelta::seconds(3541));

    let second = server
        .mock("POST", TOKENS_PATH)
        .match_body(assertion_issued("sa1", T0 + 3541))
        .with_status(200)
        .with_body(r#"{"iamToken": "tok2"}"#)
        .expect(1)
        .create_async()
        .await;

    assert_eq!(manager.get_token().await.unwrap(), "tok2");
    second.assert_async().await;
    first.assert_async().await;

    manager.shutdown().await;
}

#[tokio::test]
async fn test_server_error_leaves_cache_empty() {
    let mut server = mockito::Server::new_async().await;
    let clock = ManualClock::new(at(T0));
    let manager = manager_for(&server, &clock);

    let failing = server
        .mock("POST", TOKENS_PATH)
        .match_body(assertion_issued("sa1", T0))
        .with_status(500)
        .with_body("internal error")
        .expect(1)
        .create_async()
        .await;

    let err = manager.get_token().await.unwrap_err();
    match &err {
        CredentialError::Exchange(ExchangeFailure::Status { status, body }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("expected HTTP failure, got {:?}", other),
    }
    assert_eq!(manager.phase(), CredentialPhase::Empty);
    assert!(!manager.renewal_running());
    failing.assert_async().await;

    // A fresh assertion (new iat) proves the failed one was not reused
    clock.advance(TimeDelta::seconds(1));
    let recovered = server
        .mock("POST", TOKENS_PATH)
        .match_body(assertion_issued("sa1", T0 + 1))
        .with_status(200)
        .with_body(r#"{"iamToken": "tok1"}"#)
        .expect(1)
        .create_async()
        .await;

    assert_eq!(manager.get_token().await.unwrap(), "tok1");
    assert_eq!(manager.phase(), CredentialPhase::Valid);
    recovered.assert_async().await;
    failing.assert_async().await;

    manager.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_callers_issue_single_exchange() {
    let mut server = mockito::Server::new_async().await;
    let clock = ManualClock::new(at(T0));
    let manager = Arc::new(manager_for(&server, &clock));

    let mock = server
        .mock("POST", TOKENS_PATH)
        .with_status(200)
        .with_body(r#"{"iamToken": "shared"}"#)
        .expect(1)
        .create_async()
        .await;

    let callers: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_token().await })
        })
        .collect();

    for caller in callers {
        assert_eq!(caller.await.unwrap().unwrap(), "shared");
    }
    mock.assert_async().await;

    manager.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_endpoint_is_exchange_failure() {
    let key = KeyMaterial::new("k1", "sa1", TEST_RSA_PRIVATE_PEM).unwrap();
    let signer = JwtAssertionSigner::new(&key, TimeDelta::seconds(3600)).unwrap();
    let client = IamTokenClient::new("http://127.0.0.1:9/iam/v1/tokens", Duration::from_secs(2)).unwrap();
    let manager = CredentialManager::new(
        Arc::new(signer),
        Arc::new(client),
        Arc::new(ManualClock::new(at(T0))),
        CredentialPolicy::default(),
        RenewalSchedulerConfig::default(),
    );

    let err = manager.get_token().await.unwrap_err();

    assert!(matches!(err, CredentialError::Exchange(ExchangeFailure::Transport(_))));
    assert_eq!(manager.phase(), CredentialPhase::Empty);
}

#[tokio::test]
async fn test_manager_from_config_uses_configured_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", TOKENS_PATH)
        .with_status(200)
        .with_body(r#"{"iamToken": "from-config"}"#)
        .expect(1)
        .create_async()
        .await;

    let escaped = format!("\"{}\"", TEST_RSA_PRIVATE_PEM.trim().replace('\n', "\\n"));
    let config = CredentialsConfig {
        key_id: Some("k1".to_string()),
        service_account_id: Some("sa1".to_string()),
        private_key: Some(escaped),
        token_endpoint: format!("{}{}", server.url(), TOKENS_PATH),
        ..CredentialsConfig::default()
    };

    let manager = CredentialManager::from_config(&config).unwrap();
    assert_eq!(manager.get_token().await.unwrap(), "from-config");
    assert!(manager.token_expires_at().unwrap() > Utc::now() + TimeDelta::seconds(3500));
    mock.assert_async().await;

    manager.shutdown().await;
}
