// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection manager: the process-wide owner of the transport link.
//!
//! State machine:
//!
//! ```text
//! Idle ──initialize──► Initializing ──qr──► AwaitingScan ──open──► Connected
//!   ▲                       │  ▲                                      │
//!   │                 close │  └──────── backoff elapsed ──────┐      │ close
//!   │                       ▼                                  │      ▼
//!   └── attempts exhausted ─┴──────────── Reconnecting ◄───────┴──────┘
//!
//! any ── close(logged out) ──► LoggedOut
//! ```
//!
//! Every transition is published on a `watch` channel (for `status()`),
//! persisted as the single [`ChatSession`] row, and announced on a
//! `broadcast` channel of [`ConnectionEvent`]s.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use leadwire_core::address::{default_address, normalize_phone};
use leadwire_core::types::{
    ChatSession, CloseReason, ConnectionState, ConnectionStatus, InboundEvent, SendTarget,
    TransportEvent,
};
use leadwire_core::{LeadwireError, MessageId, Messenger, StorageAdapter, TransportLink};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::policy::ReconnectPolicy;

/// Buffer between the link and the manager's event loop.
const LINK_EVENT_CAPACITY: usize = 64;

/// Buffer of the connection event broadcast.
const EVENT_BROADCAST_CAPACITY: usize = 32;

/// Lifecycle notifications for observers (QR display, operator alerts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A credential challenge is ready to be scanned.
    Qr(String),
    Connected { account_id: String },
    /// The link dropped; `retry_in` is set when a reconnect is scheduled.
    Disconnected {
        reason: String,
        retry_in: Option<Duration>,
    },
    /// The account was unlinked; a new QR scan is required.
    LoggedOut,
    /// Reconnect attempts are exhausted; only a manual `initialize()` resumes.
    ManualRetryRequired { attempts: u32 },
}

struct ManagerState {
    session: ChatSession,
    auto_reconnect: bool,
    /// Bumped on every new link; events and retries from older links are ignored.
    generation: u64,
    event_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
}

struct Inner {
    link: Arc<dyn TransportLink + Send + Sync>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    policy: ReconnectPolicy,
    inbound: mpsc::Sender<InboundEvent>,
    state: Mutex<ManagerState>,
    status_tx: watch::Sender<ConnectionStatus>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    send_lock: tokio::sync::Mutex<()>,
}

/// Owner of the single transport link of the process.
///
/// Cheap to clone; all clones share the same link and state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

fn idle_session() -> ChatSession {
    ChatSession {
        state: ConnectionState::Idle,
        qr_payload: None,
        account_id: None,
        reconnect_attempts: 0,
        connected_at: None,
        updated_at: leadwire_core::now_timestamp(),
    }
}

/// Move to `Initializing` for a new link and return its generation.
///
/// Runs inside the same critical section as the caller's state check, so
/// two concurrent callers can never both open a link.
fn claim_open(state: &mut ManagerState) -> u64 {
    state.generation += 1;
    if let Some(previous) = state.event_task.take() {
        previous.abort();
    }
    state.session.state = ConnectionState::Initializing;
    state.session.qr_payload = None;
    state.session.updated_at = leadwire_core::now_timestamp();
    state.generation
}

fn status_of(session: &ChatSession) -> ConnectionStatus {
    ConnectionStatus {
        state: session.state,
        connected: session.state == ConnectionState::Connected,
        qr_payload: session.qr_payload.clone(),
        account_id: session.account_id.clone(),
    }
}

impl ConnectionManager {
    /// Create a manager in the `Idle` state.
    ///
    /// Returns the receiving end of the bounded inbound queue; every
    /// `Message` event from the link is forwarded there in arrival order.
    pub fn new(
        link: Arc<dyn TransportLink + Send + Sync>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        policy: ReconnectPolicy,
        inbound_capacity: usize,
    ) -> (Self, mpsc::Receiver<InboundEvent>) {
        let (inbound, inbound_rx) = mpsc::channel(inbound_capacity.max(1));
        let session = idle_session();
        let (status_tx, _) = watch::channel(status_of(&session));
        let (events_tx, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);

        let inner = Inner {
            link,
            storage,
            policy,
            inbound,
            state: Mutex::new(ManagerState {
                session,
                auto_reconnect: policy.auto_reconnect,
                generation: 0,
                event_task: None,
                retry_task: None,
            }),
            status_tx,
            events_tx,
            send_lock: tokio::sync::Mutex::new(()),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            inbound_rx,
        )
    }

    /// Open the transport link.
    ///
    /// No-op while `Connected`, `Initializing` or `AwaitingScan`. From any
    /// other state the attempt counter is reset, automatic reconnection is
    /// re-enabled and a pending retry is cancelled. Failures to open follow
    /// the same backoff policy as unexpected closes.
    pub async fn initialize(&self) -> Result<(), LeadwireError> {
        let generation = {
            let mut state = self.inner.lock();
            match state.session.state {
                ConnectionState::Connected
                | ConnectionState::Initializing
                | ConnectionState::AwaitingScan => {
                    debug!(state = %state.session.state, "initialize ignored, link already active");
                    return Ok(());
                }
                _ => {}
            }
            state.session.reconnect_attempts = 0;
            state.auto_reconnect = self.inner.policy.auto_reconnect;
            if let Some(retry) = state.retry_task.take() {
                retry.abort();
            }
            claim_open(&mut state)
        };
        info!(link = self.inner.link.name(), "initializing transport link");
        self.inner.open_link(generation).await;
        Ok(())
    }

    /// Intentional disconnect: close the link, discard credentials, go `Idle`.
    ///
    /// Automatic reconnection stays disabled until the next `initialize()`.
    pub async fn disconnect(&self) -> Result<(), LeadwireError> {
        let snapshot = self.inner.detach(|session| {
            session.state = ConnectionState::Idle;
            session.qr_payload = None;
            session.account_id = None;
            session.connected_at = None;
            session.reconnect_attempts = 0;
        });
        info!("disconnecting transport link");

        // The logout has to travel over the link, so it goes out before the close.
        let cleared = self.inner.link.clear_session().await;
        if let Err(e) = &cleared {
            warn!(error = %e, "failed to clear transport credentials");
        }
        let closed = self.inner.link.close().await;
        if let Err(e) = &closed {
            warn!(error = %e, "transport link close failed");
        }

        self.inner.publish(snapshot).await;
        self.inner.announce(ConnectionEvent::Disconnected {
            reason: "manual disconnect".to_string(),
            retry_in: None,
        });
        closed.and(cleared)
    }

    /// Process shutdown: close the link but keep credentials for the next start.
    pub async fn shutdown(&self) -> Result<(), LeadwireError> {
        let snapshot = self.inner.detach(|session| {
            session.state = ConnectionState::Idle;
            session.qr_payload = None;
        });
        let closed = self.inner.link.close().await;
        self.inner.publish(snapshot).await;
        info!("connection manager stopped");
        closed
    }

    /// Subscribe to lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Watch the status snapshot.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Current persisted-shape session snapshot.
    pub fn session(&self) -> ChatSession {
        self.inner.lock().session.clone()
    }

    async fn resolve_address(&self, target: SendTarget) -> Result<String, LeadwireError> {
        match target {
            SendTarget::Contact(id) => {
                let contact = self
                    .inner
                    .storage
                    .get_contact(&id)
                    .await?
                    .ok_or(LeadwireError::NotFound {
                        entity: "contact",
                        id,
                    })?;
                Ok(contact
                    .remote_address
                    .unwrap_or_else(|| default_address(&contact.phone)))
            }
            SendTarget::Address(raw) if raw.contains('@') => Ok(raw),
            SendTarget::Address(raw) => {
                let recorded = match normalize_phone(&raw) {
                    Some(phone) => self
                        .inner
                        .storage
                        .find_contact_by_phone(&phone)
                        .await?
                        .and_then(|c| c.remote_address),
                    None => None,
                };
                Ok(recorded.unwrap_or_else(|| default_address(&raw)))
            }
        }
    }
}

#[async_trait]
impl Messenger for ConnectionManager {
    fn status(&self) -> ConnectionStatus {
        self.inner.status_tx.borrow().clone()
    }

    async fn send(&self, target: SendTarget, text: &str) -> Result<MessageId, LeadwireError> {
        match self.status().state {
            ConnectionState::Connected => {}
            ConnectionState::LoggedOut => return Err(LeadwireError::TransportAuthExpired),
            _ => return Err(LeadwireError::TransportUnavailable),
        }
        let address = self.resolve_address(target).await?;

        let _serial = self.inner.send_lock.lock().await;
        let id = self.inner.link.send_text(&address, text).await?;
        debug!(to = address.as_str(), message_id = id.0.as_str(), "message sent");
        Ok(id)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        // Critical sections only assign fields, so a poisoned state is still whole.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `change` to the session under the lock and return the new snapshot.
    fn transition(&self, change: impl FnOnce(&mut ManagerState)) -> ChatSession {
        let mut state = self.lock();
        change(&mut state);
        state.session.updated_at = leadwire_core::now_timestamp();
        state.session.clone()
    }

    /// Stop reacting to the current link: disable retries, cancel pending
    /// tasks, and invalidate in-flight events.
    fn detach(&self, change: impl FnOnce(&mut ChatSession)) -> ChatSession {
        self.transition(|state| {
            state.auto_reconnect = false;
            state.generation += 1;
            if let Some(retry) = state.retry_task.take() {
                retry.abort();
            }
            if let Some(events) = state.event_task.take() {
                events.abort();
            }
            change(&mut state.session);
        })
    }

    async fn publish(&self, session: ChatSession) {
        self.status_tx.send_replace(status_of(&session));
        if let Err(e) = self.storage.save_chat_session(&session).await {
            warn!(error = %e, state = %session.state, "failed to persist chat session");
        }
    }

    fn announce(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }

    /// Start the link claimed as `generation` by [`claim_open`].
    async fn open_link(self: &Arc<Self>, generation: u64) {
        let (events_tx, events_rx) = mpsc::channel(LINK_EVENT_CAPACITY);
        let snapshot = {
            let state = self.lock();
            if state.generation != generation {
                return;
            }
            state.session.clone()
        };
        self.publish(snapshot).await;

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.run_link_events(generation, events_rx).await });
        {
            let mut state = self.lock();
            if state.generation == generation {
                state.event_task = Some(handle);
            } else {
                handle.abort();
                return;
            }
        }

        if let Err(e) = self.link.open(events_tx).await {
            warn!(error = %e, "transport link failed to open");
            self.on_closed(generation, CloseReason::Other(e.to_string()))
                .await;
        }
    }

    async fn run_link_events(self: Arc<Self>, generation: u64, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            if self.lock().generation != generation {
                debug!("dropping event from a replaced link");
                break;
            }
            match event {
                TransportEvent::Qr(payload) => self.on_qr(payload).await,
                TransportEvent::Open { account_id } => self.on_open(account_id).await,
                TransportEvent::Closed { reason } => self.on_closed(generation, reason).await,
                TransportEvent::Message(message) => {
                    if self.inbound.send(message).await.is_err() {
                        error!("inbound queue closed, dropping message");
                    }
                }
            }
        }
        debug!(generation, "link event loop ended");
    }

    async fn on_qr(&self, payload: String) {
        let snapshot = self.transition(|state| {
            state.session.state = ConnectionState::AwaitingScan;
            state.session.qr_payload = Some(payload.clone());
        });
        info!("QR code ready, scan it with the phone to link the account");
        self.publish(snapshot).await;
        self.announce(ConnectionEvent::Qr(payload));
    }

    async fn on_open(&self, account_id: String) {
        let snapshot = self.transition(|state| {
            state.session.state = ConnectionState::Connected;
            state.session.qr_payload = None;
            state.session.reconnect_attempts = 0;
            state.session.account_id = Some(account_id.clone());
            state.session.connected_at = Some(leadwire_core::now_timestamp());
        });
        info!(account_id = account_id.as_str(), "transport link connected");
        self.publish(snapshot).await;
        self.announce(ConnectionEvent::Connected { account_id });
    }

    async fn on_closed(self: &Arc<Self>, generation: u64, reason: CloseReason) {
        enum Next {
            Stale,
            LoggedOut,
            Stop(String),
            Retry { attempt: u32, delay: Duration, reason: String },
            GiveUp(u32),
        }

        let policy = self.policy;
        let mut next = Next::Stale;
        let snapshot = self.transition(|state| {
            if state.generation != generation {
                return;
            }
            match &reason {
                CloseReason::LoggedOut => {
                    state.session.state = ConnectionState::LoggedOut;
                    state.session.qr_payload = None;
                    state.session.account_id = None;
                    state.session.connected_at = None;
                    state.session.reconnect_attempts = 0;
                    next = Next::LoggedOut;
                }
                CloseReason::Other(detail) if !state.auto_reconnect => {
                    state.session.state = ConnectionState::Idle;
                    state.session.connected_at = None;
                    next = Next::Stop(detail.clone());
                }
                CloseReason::Other(detail) => {
                    let attempt = state.session.reconnect_attempts + 1;
                    state.session.connected_at = None;
                    state.session.qr_payload = None;
                    if policy.allows(attempt) {
                        state.session.state = ConnectionState::Reconnecting;
                        state.session.reconnect_attempts = attempt;
                        next = Next::Retry {
                            attempt,
                            delay: policy.delay_for(attempt),
                            reason: detail.clone(),
                        };
                    } else {
                        state.session.state = ConnectionState::Idle;
                        next = Next::GiveUp(state.session.reconnect_attempts);
                    }
                }
            }
        });

        match next {
            Next::Stale => {
                debug!(generation, "ignoring close from a replaced link");
            }
            Next::LoggedOut => {
                warn!("transport account logged out, a new QR scan is required");
                if let Err(e) = self.link.clear_session().await {
                    warn!(error = %e, "failed to clear transport credentials");
                }
                self.publish(snapshot).await;
                self.announce(ConnectionEvent::LoggedOut);
            }
            Next::Stop(reason) => {
                info!(reason = reason.as_str(), "transport link closed, auto-reconnect disabled");
                self.publish(snapshot).await;
                self.announce(ConnectionEvent::Disconnected {
                    reason,
                    retry_in: None,
                });
            }
            Next::Retry {
                attempt,
                delay,
                reason,
            } => {
                warn!(
                    reason = reason.as_str(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "transport link closed, reconnect scheduled"
                );
                self.publish(snapshot).await;
                self.schedule_retry(generation, delay);
                self.announce(ConnectionEvent::Disconnected {
                    reason,
                    retry_in: Some(delay),
                });
            }
            Next::GiveUp(attempts) => {
                error!(
                    attempts,
                    "reconnect attempts exhausted, manual initialize required"
                );
                self.publish(snapshot).await;
                self.announce(ConnectionEvent::ManualRetryRequired { attempts });
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, generation: u64, delay: Duration) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let claimed = {
                let mut state = inner.lock();
                let due = state.generation == generation
                    && state.auto_reconnect
                    && state.session.state == ConnectionState::Reconnecting;
                due.then(|| claim_open(&mut state))
            };
            if let Some(next) = claimed {
                debug!(generation = next, "reconnecting transport link");
                inner.open_link(next).await;
            }
        });
        // The previous handle, if any, belongs to the task calling us.
        self.lock().retry_task = Some(handle);
    }
}
