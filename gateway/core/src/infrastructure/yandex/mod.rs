// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0

// Yandex Cloud Infrastructure
//
// Service-account assertion signing and IAM token exchange.

pub mod assertion_signer;
pub mod iam_client;

pub use assertion_signer::{AssertionClaims, JwtAssertionSigner};
pub use iam_client::IamTokenClient;

/// Audience of every service-account assertion; also the default exchange URL.
pub const IAM_AUDIENCE: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";
