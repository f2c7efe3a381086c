// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Adapters behind the credential seams: Yandex Cloud assertion signing, IAM
//! token exchange, and bearer authorization of outgoing requests.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `AssertionSigner`, `TokenExchanger` and request
//!   authorization on top of `jsonwebtoken` and `reqwest`

pub mod bearer_auth;
pub mod yandex;
