// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Credential types, time abstraction and gateway configuration schema.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and seams; no network or filesystem access except
//!   configuration loading

pub mod clock;
pub mod credentials;
pub mod gateway_config;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{
    AssertionSigner, BearerToken, CredentialError, CredentialPhase, CredentialPolicy,
    CredentialState, ExchangeFailure, KeyMaterial, SignedAssertion, TokenExchanger, TokenSource,
};
