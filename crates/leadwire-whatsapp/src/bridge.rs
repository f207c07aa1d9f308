// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket client for the WhatsApp session bridge.
//!
//! The bridge is a sidecar process that runs the chat-transport SDK and
//! exchanges JSON frames tagged by `type`:
//!
//! | direction | frame |
//! |-----------|-------|
//! | bridge → us | `qr {payload}`, `open {account_id}`, `close {reason}`, `message {message}`, `sent {request_id, message_id}`, `send_error {request_id, error}` |
//! | us → bridge | `start {session_dir}`, `send {request_id, to, text}`, `logout` |

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use leadwire_config::model::WhatsAppConfig;
use leadwire_core::types::{AdapterType, CloseReason, HealthStatus, InboundEvent, TransportEvent};
use leadwire_core::{LeadwireError, MessageId, PluginAdapter, TransportLink};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// How long a `send` waits for the bridge to acknowledge.
const SEND_ACK_TIMEOUT: Duration = Duration::from_secs(20);

/// How long `close` waits for queued frames to reach the bridge.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound frames buffered toward the bridge.
const OUTBOUND_CAPACITY: usize = 64;

/// Frames received from the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum BridgeFrame {
    Qr { payload: String },
    Open { account_id: String },
    Close { reason: CloseReason },
    Message { message: InboundEvent },
    Sent { request_id: String, message_id: String },
    SendError { request_id: String, error: String },
}

/// Frames sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum BridgeCommand<'a> {
    Start { session_dir: &'a str },
    Send {
        request_id: &'a str,
        to: &'a str,
        text: &'a str,
    },
    Logout,
}

type PendingSends = Arc<Mutex<HashMap<String, oneshot::Sender<Result<String, String>>>>>;

struct BridgeConnection {
    outbound: mpsc::Sender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl BridgeConnection {
    fn abort(self) {
        self.reader.abort();
        self.writer.abort();
    }

    /// Let the writer flush queued frames (a final `logout`) before stopping.
    async fn close(self) {
        let Self {
            outbound,
            reader,
            mut writer,
        } = self;
        drop(outbound);
        if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            warn!("bridge writer did not flush in time");
            writer.abort();
        }
        reader.abort();
    }
}

/// [`TransportLink`] backed by the session bridge.
pub struct BridgeLink {
    url: String,
    session_dir: PathBuf,
    ack_timeout: Duration,
    connection: tokio::sync::Mutex<Option<BridgeConnection>>,
    pending: PendingSends,
}

impl BridgeLink {
    pub fn new(url: impl Into<String>, session_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            session_dir: session_dir.into(),
            ack_timeout: SEND_ACK_TIMEOUT,
            connection: tokio::sync::Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self::new(config.bridge_url.clone(), &config.session_dir)
    }

    /// Override the send acknowledgement timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    async fn outbound(&self) -> Result<mpsc::Sender<String>, LeadwireError> {
        let guard = self.connection.lock().await;
        guard
            .as_ref()
            .map(|c| c.outbound.clone())
            .ok_or(LeadwireError::TransportUnavailable)
    }
}

fn encode(command: &BridgeCommand<'_>) -> Result<String, LeadwireError> {
    serde_json::to_string(command).map_err(|e| LeadwireError::Transport {
        message: "failed to encode bridge command".to_string(),
        source: Some(Box::new(e)),
    })
}

fn fail_pending(pending: &PendingSends, reason: &str) {
    let drained: Vec<_> = match pending.lock() {
        Ok(mut map) => map.drain().collect(),
        Err(poisoned) => poisoned.into_inner().drain().collect(),
    };
    for (_, waiter) in drained {
        let _ = waiter.send(Err(reason.to_string()));
    }
}

fn take_pending(
    pending: &PendingSends,
    request_id: &str,
) -> Option<oneshot::Sender<Result<String, String>>> {
    match pending.lock() {
        Ok(mut map) => map.remove(request_id),
        Err(poisoned) => poisoned.into_inner().remove(request_id),
    }
}

/// Route one bridge frame. Returns `false` once the link is closed.
async fn dispatch_frame(
    frame: BridgeFrame,
    events: &mpsc::Sender<TransportEvent>,
    pending: &PendingSends,
) -> bool {
    let event = match frame {
        BridgeFrame::Qr { payload } => TransportEvent::Qr(payload),
        BridgeFrame::Open { account_id } => TransportEvent::Open { account_id },
        BridgeFrame::Close { reason } => {
            let _ = events.send(TransportEvent::Closed { reason }).await;
            return false;
        }
        BridgeFrame::Message { message } => TransportEvent::Message(message),
        BridgeFrame::Sent {
            request_id,
            message_id,
        } => {
            if let Some(waiter) = take_pending(pending, &request_id) {
                let _ = waiter.send(Ok(message_id));
            }
            return true;
        }
        BridgeFrame::SendError { request_id, error } => {
            if let Some(waiter) = take_pending(pending, &request_id) {
                let _ = waiter.send(Err(error));
            }
            return true;
        }
    };
    events.send(event).await.is_ok()
}

#[async_trait]
impl PluginAdapter for BridgeLink {
    fn name(&self) -> &str {
        "whatsapp-bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwireError> {
        let guard = self.connection.lock().await;
        Ok(match guard.as_ref() {
            Some(c) if !c.reader.is_finished() => HealthStatus::Healthy,
            Some(_) => HealthStatus::Degraded("bridge connection ended".to_string()),
            None => HealthStatus::Unhealthy("bridge not connected".to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), LeadwireError> {
        self.close().await
    }
}

#[async_trait]
impl TransportLink for BridgeLink {
    async fn open(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), LeadwireError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| LeadwireError::Transport {
                message: format!("failed to reach bridge at {}", self.url),
                source: Some(Box::new(e)),
            })?;
        info!(url = self.url.as_str(), "connected to WhatsApp bridge");

        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let pending = Arc::clone(&self.pending);
        let reader = tokio::spawn(async move {
            let mut closed_by_bridge = false;
            while let Some(Ok(msg)) = ws_receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        let text_str: &str = &text;
                        match serde_json::from_str::<BridgeFrame>(text_str) {
                            Ok(frame) => {
                                if !dispatch_frame(frame, &events, &pending).await {
                                    closed_by_bridge = true;
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "ignoring malformed bridge frame");
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            fail_pending(&pending, "bridge connection closed");
            if !closed_by_bridge {
                let _ = events
                    .send(TransportEvent::Closed {
                        reason: CloseReason::Other("bridge connection lost".to_string()),
                    })
                    .await;
            }
            debug!("bridge reader finished");
        });

        let session_dir = self.session_dir.to_string_lossy();
        let start = encode(&BridgeCommand::Start {
            session_dir: &session_dir,
        })?;
        if outbound.send(start).await.is_err() {
            reader.abort();
            writer.abort();
            return Err(LeadwireError::Transport {
                message: "bridge writer stopped before start".to_string(),
                source: None,
            });
        }

        let mut guard = self.connection.lock().await;
        if let Some(previous) = guard.replace(BridgeConnection {
            outbound,
            reader,
            writer,
        }) {
            previous.abort();
        }
        Ok(())
    }

    async fn send_text(&self, address: &str, text: &str) -> Result<MessageId, LeadwireError> {
        let outbound = self.outbound().await?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let frame = encode(&BridgeCommand::Send {
            request_id: &request_id,
            to: address,
            text,
        })?;

        let (tx, rx) = oneshot::channel();
        match self.pending.lock() {
            Ok(mut map) => map.insert(request_id.clone(), tx),
            Err(poisoned) => poisoned.into_inner().insert(request_id.clone(), tx),
        };

        if outbound.send(frame).await.is_err() {
            take_pending(&self.pending, &request_id);
            return Err(LeadwireError::TransportUnavailable);
        }

        match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(Ok(Ok(message_id))) => Ok(MessageId(message_id)),
            Ok(Ok(Err(error))) => Err(LeadwireError::Transport {
                message: error,
                source: None,
            }),
            Ok(Err(_dropped)) => Err(LeadwireError::TransportUnavailable),
            Err(_elapsed) => {
                take_pending(&self.pending, &request_id);
                Err(LeadwireError::Timeout {
                    duration: self.ack_timeout,
                })
            }
        }
    }

    async fn close(&self) -> Result<(), LeadwireError> {
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.close().await;
            debug!("bridge connection closed");
        }
        fail_pending(&self.pending, "bridge connection closed");
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), LeadwireError> {
        if let Ok(outbound) = self.outbound().await {
            let _ = outbound.send(encode(&BridgeCommand::Logout)?).await;
        }
        match tokio::fs::remove_dir_all(&self.session_dir).await {
            Ok(()) => {
                info!(dir = %self.session_dir.display(), "transport credentials removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LeadwireError::Transport {
                message: format!("failed to remove {}", self.session_dir.display()),
                source: Some(Box::new(e)),
            }),
        }
    }
}
