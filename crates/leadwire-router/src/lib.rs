// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification and specialist routing.
//!
//! [`IntentClassifier`] labels the latest customer message with the fixed
//! intent taxonomy, using the language service when available and keyword
//! patterns otherwise, and applies the intent's tag/score/status policy to
//! the contact. [`SpecialistRouter`] sends intents that need business data
//! to a single-turn specialist and returns the grounding text for the reply.

pub mod classifier;
pub mod keywords;
pub mod mapping;
pub mod router;

pub use classifier::IntentClassifier;
pub use mapping::{IntentPolicy, policy_for, specialty_for};
pub use router::{RouteRequest, SpecialistRouter};
