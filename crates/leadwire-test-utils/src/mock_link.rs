// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport link for connection-manager and end-to-end tests.
//!
//! The link keeps the event sender handed to the latest `open`, so tests can
//! play the phone's side: emit QR challenges, closes and inbound messages.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use leadwire_core::types::{AdapterType, CloseReason, HealthStatus, MessageId, TransportEvent};
use leadwire_core::{LeadwireError, PluginAdapter, TransportLink};

/// What a scripted `open` does.
#[derive(Debug, Clone)]
enum OpenScript {
    Fail,
    Emit(Vec<TransportEvent>),
}

/// A transport link driven by the test.
///
/// By default every `open` succeeds and emits nothing; use
/// [`MockLink::auto_connect`] to have each open report `Open` right away.
pub struct MockLink {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    scripts: Mutex<VecDeque<OpenScript>>,
    on_open: Mutex<Vec<TransportEvent>>,
    always_fail: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<(String, String)>>,
    opens: AtomicU32,
    closes: AtomicU32,
    clears: AtomicU32,
    calls: Mutex<Vec<&'static str>>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(None),
            scripts: Mutex::new(VecDeque::new()),
            on_open: Mutex::new(Vec::new()),
            always_fail: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            opens: AtomicU32::new(0),
            closes: AtomicU32::new(0),
            clears: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A link whose every unscripted open reports `Open { account_id }`.
    pub fn auto_connect(account_id: &str) -> Self {
        let link = Self::new();
        *link.on_open.lock().expect("mock link lock") = vec![TransportEvent::Open {
            account_id: account_id.to_string(),
        }];
        link
    }

    /// Make the next `n` opens fail before any event is emitted.
    pub fn fail_next_opens(&self, n: usize) {
        let mut scripts = self.scripts.lock().expect("mock link lock");
        scripts.extend(std::iter::repeat_n(OpenScript::Fail, n));
    }

    /// Make the next `n` opens succeed and then close immediately.
    pub fn drop_next_opens(&self, n: usize, reason: &str) {
        let close = TransportEvent::Closed {
            reason: CloseReason::Other(reason.to_string()),
        };
        let mut scripts = self.scripts.lock().expect("mock link lock");
        scripts.extend(std::iter::repeat_n(OpenScript::Emit(vec![close]), n));
    }

    /// Make every open fail until reset.
    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Deliver `event` on the most recently opened link.
    ///
    /// # Panics
    ///
    /// Panics if the link was never opened or the manager stopped listening.
    pub async fn emit(&self, event: TransportEvent) {
        let sender = self
            .events
            .lock()
            .expect("mock link lock")
            .clone()
            .expect("emit on a link that was never opened");
        sender.send(event).await.expect("link event receiver dropped");
    }

    /// Every `(address, text)` pair sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("mock link lock").clone()
    }

    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> u32 {
        self.clears.load(Ordering::SeqCst)
    }

    /// Lifecycle calls (`open`, `close`, `clear_session`) in the order made.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("mock link lock").clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().expect("mock link lock").push(call);
    }
}

#[async_trait]
impl PluginAdapter for MockLink {
    fn name(&self) -> &str {
        "mock-link"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwireError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwireError> {
        Ok(())
    }
}

#[async_trait]
impl TransportLink for MockLink {
    async fn open(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), LeadwireError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.record("open");

        let script = self.scripts.lock().expect("mock link lock").pop_front();
        if self.always_fail.load(Ordering::SeqCst) || matches!(script, Some(OpenScript::Fail)) {
            return Err(LeadwireError::Transport {
                message: "mock open failure".to_string(),
                source: None,
            });
        }

        *self.events.lock().expect("mock link lock") = Some(events.clone());
        let emitted = match script {
            Some(OpenScript::Emit(emitted)) => emitted,
            _ => self.on_open.lock().expect("mock link lock").clone(),
        };
        for event in emitted {
            // The manager may already have replaced this link.
            if events.send(event).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn send_text(&self, address: &str, text: &str) -> Result<MessageId, LeadwireError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(LeadwireError::Transport {
                message: "mock send rejected".to_string(),
                source: None,
            });
        }
        let mut sent = self.sent.lock().expect("mock link lock");
        sent.push((address.to_string(), text.to_string()));
        Ok(MessageId(format!("mock-out-{}", sent.len())))
    }

    async fn close(&self) -> Result<(), LeadwireError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.record("close");
        self.events.lock().expect("mock link lock").take();
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), LeadwireError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.record("clear_session");
        Ok(())
    }
}
