// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Credential lifecycle core for the llmbox gateway.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Exposes the domain model, the credential manager and the
//!   Yandex Cloud IAM adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::credential_manager::CredentialManager;
