// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0

// Outgoing request authorization for provider adapters.

use crate::domain::credentials::{CredentialError, TokenSource};

/// Attach `Authorization: Bearer <token>` using a fresh token from `source`.
pub async fn authorize(
    request: reqwest::RequestBuilder,
    source: &dyn TokenSource,
) -> Result<reqwest::RequestBuilder, CredentialError> {
    let token = source.bearer_token().await?;
    Ok(request.bearer_auth(token))
}
