// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp transport for the Leadwire pipeline.
//!
//! [`ConnectionManager`] owns the single transport link of the process: it
//! drives the link through QR authentication, reconnects with bounded
//! exponential backoff, forwards inbound messages into a bounded queue for
//! the pipeline, and is the only path for outbound sends.
//!
//! [`BridgeLink`] is the production [`TransportLink`](leadwire_core::TransportLink):
//! a WebSocket client for an external session bridge that runs the
//! chat-transport SDK.

pub mod bridge;
pub mod manager;
pub mod policy;

pub use bridge::BridgeLink;
pub use manager::{ConnectionEvent, ConnectionManager};
pub use policy::ReconnectPolicy;
