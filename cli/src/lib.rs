// Copyright (c) 2026 llmbox contributors
// SPDX-License-Identifier: AGPL-3.0
//! llmbox CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers behind the `llmbox` binary

pub mod commands;
