// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Leadwire integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a language service or a phone.
//!
//! # Components
//!
//! - [`MockProvider`] - Language service with scripted answers per pipeline stage
//! - [`MockLink`] - Transport link with injectable events and captured sends
//! - [`TestHarness`] - Temp storage, connection manager and pipeline wired together

pub mod harness;
pub mod mock_link;
pub mod mock_provider;

pub use harness::{TestHarness, text_event};
pub use mock_link::MockLink;
pub use mock_provider::MockProvider;
