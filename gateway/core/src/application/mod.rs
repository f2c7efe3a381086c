// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Credential lifecycle orchestration.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Coordinates signing, exchange, caching and background renewal

pub mod credential_manager;
pub mod renewal_scheduler;

pub use credential_manager::CredentialManager;
pub use renewal_scheduler::{CredentialRenewer, RenewalScheduler, RenewalSchedulerConfig};
