//! Session object over the signaling relay connection.
//!
//! One session per appointment view. The connection handle is owned by
//! the session; `connect()` closes any prior handle before opening a new
//! one, so at most one connection is ever live. Sends without a live
//! connection are silent no-ops. Reconnection policy stays with the
//! transport/caller; the session itself never redials.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{ChatMessage, VideoSignal};
use crate::storage::{keys, StorageAdapter};

use super::protocol::{ClientFrame, ServerFrame};

type ChatHandler = Box<dyn Fn(ChatMessage) + Send + Sync>;
type SignalHandler = Box<dyn Fn(VideoSignal) + Send + Sync>;

struct Connection {
    id: u64,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    reader: JoinHandle<()>,
}

struct SessionShared {
    signaling_url: String,
    appointment_id: String,
    storage: Arc<dyn StorageAdapter>,
    next_handler_id: AtomicU64,
    next_connection_id: AtomicU64,
    chat_handlers: Mutex<HashMap<u64, ChatHandler>>,
    signal_handlers: Mutex<HashMap<u64, SignalHandler>>,
    connection: Mutex<Option<Connection>>,
}

impl SessionShared {
    fn dispatch(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::ReceiveMessage { sender_id, message } => {
                let message = ChatMessage {
                    sender_id,
                    body: message,
                };
                if let Ok(handlers) = self.chat_handlers.lock() {
                    for handler in handlers.values() {
                        handler(message.clone());
                    }
                }
            }
            ServerFrame::ReceiveVideoSignal { sender_id, signal } => {
                let signal = VideoSignal {
                    sender_id,
                    data: signal,
                };
                if let Ok(handlers) = self.signal_handlers.lock() {
                    for handler in handlers.values() {
                        handler(signal.clone());
                    }
                }
            }
        }
    }

    /// Drop the connection slot if it still holds connection `id`.
    /// Called by the reader task when the server side goes away, so a
    /// newer connection is never clobbered.
    fn clear_connection(&self, id: u64) {
        if let Ok(mut slot) = self.connection.lock()
            && slot.as_ref().is_some_and(|conn| conn.id == id)
        {
            *slot = None;
        }
    }
}

/// Chat/video signaling session scoped to one appointment.
pub struct SignalingSession {
    shared: Arc<SessionShared>,
}

impl SignalingSession {
    /// Create an unconnected session for `appointment_id`. Call
    /// [`connect`](Self::connect) to establish the transport.
    pub fn new(
        config: &ClientConfig,
        appointment_id: impl Into<String>,
        storage: Arc<dyn StorageAdapter>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                signaling_url: config.signaling_url.clone(),
                appointment_id: appointment_id.into(),
                storage,
                next_handler_id: AtomicU64::new(0),
                next_connection_id: AtomicU64::new(0),
                chat_handlers: Mutex::new(HashMap::new()),
                signal_handlers: Mutex::new(HashMap::new()),
                connection: Mutex::new(None),
            }),
        }
    }

    pub fn appointment_id(&self) -> &str {
        &self.shared.appointment_id
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .connection
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Establish the relay connection, closing any prior one first.
    ///
    /// The bearer token is read from storage and passed as the
    /// `access_token` query parameter.
    pub async fn connect(&self) -> Result<()> {
        self.close();

        let token = self
            .shared
            .storage
            .get(keys::TOKEN)
            .ok_or(ClientError::Unauthenticated)?;

        let url = Url::parse_with_params(
            &self.shared.signaling_url,
            &[
                ("appointmentId", self.shared.appointment_id.as_str()),
                ("access_token", token.as_str()),
            ],
        )
        .map_err(|err| ClientError::Application(format!("invalid signaling URL: {err}")))?;

        let (socket, _response) = connect_async(url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let connection_id = self.shared.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientFrame>();

        // Writer: drains the outbound queue into the socket. Ends when the
        // session drops the sender or the socket breaks.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!("failed to encode signaling frame: {}", err);
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::text(text)).await {
                    tracing::debug!("signaling send failed, dropping connection: {}", err);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: dispatches inbound frames to the registered handlers in
        // delivery order. No buffering: frames arriving while no handler
        // is registered are gone.
        let weak = Arc::downgrade(&self.shared);
        let reader = tokio::spawn(async move {
            while let Some(next) = stream.next().await {
                let message = match next {
                    Ok(message) => message,
                    Err(err) => {
                        tracing::debug!("signaling connection lost: {}", err);
                        break;
                    }
                };
                let Message::Text(text) = message else {
                    continue;
                };
                let Some(shared) = weak.upgrade() else { break };
                match serde_json::from_str::<ServerFrame>(text.as_str()) {
                    Ok(frame) => shared.dispatch(frame),
                    Err(err) => {
                        tracing::debug!("ignoring malformed signaling frame: {}", err);
                    }
                }
            }
            if let Some(shared) = weak.upgrade() {
                shared.clear_connection(connection_id);
            }
        });

        if let Ok(mut slot) = self.shared.connection.lock() {
            *slot = Some(Connection {
                id: connection_id,
                outbound: outbound_tx,
                reader,
            });
        }

        tracing::info!(
            "signaling session connected for appointment {}",
            self.shared.appointment_id
        );
        Ok(())
    }

    /// Relay a chat line from `user_id` to the appointment's other
    /// participants. Fire-and-forget; with no live connection this is a
    /// silent no-op.
    pub fn send_chat(&self, user_id: &str, message: &str) {
        self.send(ClientFrame::SendMessage {
            appointment_id: self.shared.appointment_id.clone(),
            user_id: user_id.to_string(),
            message: message.to_string(),
        });
    }

    /// Relay an opaque negotiation payload to `receiver_id`. The payload
    /// is never inspected. Fire-and-forget like [`send_chat`](Self::send_chat).
    pub fn send_signal(&self, receiver_id: &str, signal: serde_json::Value) {
        self.send(ClientFrame::SendVideoSignal {
            receiver_id: receiver_id.to_string(),
            signal,
        });
    }

    fn send(&self, frame: ClientFrame) {
        let Ok(slot) = self.shared.connection.lock() else {
            return;
        };
        match slot.as_ref() {
            Some(connection) => {
                if connection.outbound.send(frame).is_err() {
                    tracing::debug!("signaling connection gone, frame dropped");
                }
            }
            None => tracing::debug!("no signaling connection, frame dropped"),
        }
    }

    /// Subscribe to inbound chat messages. Dropping the returned handle
    /// (or calling `unsubscribe`) deregisters the callback.
    pub fn on_chat<F>(&self, handler: F) -> EventSubscription
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        let id = self.shared.next_handler_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut handlers) = self.shared.chat_handlers.lock() {
            handlers.insert(id, Box::new(handler));
        }
        EventSubscription {
            id,
            kind: HandlerKind::Chat,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Subscribe to inbound video signals.
    pub fn on_signal<F>(&self, handler: F) -> EventSubscription
    where
        F: Fn(VideoSignal) + Send + Sync + 'static,
    {
        let id = self.shared.next_handler_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut handlers) = self.shared.signal_handlers.lock() {
            handlers.insert(id, Box::new(handler));
        }
        EventSubscription {
            id,
            kind: HandlerKind::Signal,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Tear down the connection. Idempotent; subsequent sends are no-ops
    /// until `connect()` is called again.
    pub fn close(&self) {
        let connection = match self.shared.connection.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(connection) = connection {
            // Dropping the sender ends the writer, which closes the socket.
            drop(connection.outbound);
            connection.reader.abort();
            tracing::info!(
                "signaling session closed for appointment {}",
                self.shared.appointment_id
            );
        }
    }
}

impl Drop for SignalingSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SignalingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingSession")
            .field("appointment_id", &self.shared.appointment_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

enum HandlerKind {
    Chat,
    Signal,
}

/// Handle for a registered chat or signal callback. Deregisters on drop.
pub struct EventSubscription {
    id: u64,
    kind: HandlerKind,
    shared: Weak<SessionShared>,
}

impl EventSubscription {
    /// Explicitly deregister the callback.
    pub fn unsubscribe(self) {}
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        match self.kind {
            HandlerKind::Chat => {
                if let Ok(mut handlers) = shared.chat_handlers.lock() {
                    handlers.remove(&self.id);
                }
            }
            HandlerKind::Signal => {
                if let Ok(mut handlers) = shared.signal_handlers.lock() {
                    handlers.remove(&self.id);
                }
            }
        }
    }
}
