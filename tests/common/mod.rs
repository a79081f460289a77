//! Test utilities for the telecare SDK integration tests.
//!
//! Spawns a scripted stub backend (REST + signaling relay) on an
//! ephemeral port, plus a raw listener that accepts and drops
//! connections to simulate transport failures.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use telecare::storage::keys;
use telecare::{ClientConfig, MemoryStorage, PollEvent, PollState, PollerConfig, StorageAdapter};

pub const TEST_TOKEN: &str = "test-bearer-token";

/// One scripted response of the payment-status endpoint.
pub enum StatusStep {
    Pending,
    /// `status = "Completed"` with the given subscription JSON (or null).
    Completed(Value),
    /// `status = "Failed"` with an optional server message.
    Declined(Option<&'static str>),
    /// An unrecognized raw status string.
    Unknown(&'static str),
    /// `isSuccess = false` envelope with one error message.
    AppError(&'static str),
    /// A bare HTTP error without an envelope body.
    HttpError(u16),
}

#[derive(Default)]
pub struct StubState {
    pub status_script: Mutex<VecDeque<StatusStep>>,
    pub status_calls: AtomicUsize,
    pub confirm_calls: AtomicUsize,
    pub create_bodies: Mutex<Vec<Value>>,
    pub last_authorization: Mutex<Option<String>>,

    /// When set, an inbound `sendMessage` frame is answered with a
    /// `receiveMessage` frame, as the relay would for the peer.
    pub relay_chat: AtomicBool,
    /// Frames pushed to every client immediately after the upgrade.
    pub push_on_connect: Mutex<Vec<String>>,
    pub connect_params: Mutex<Vec<HashMap<String, String>>>,
    pub ws_connections: AtomicUsize,
    pub ws_closed: AtomicUsize,
    pub ws_received: Mutex<Vec<Value>>,
    ws_push: Mutex<Vec<mpsc::UnboundedSender<String>>>,
}

pub struct StubBackend {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
}

impl StubBackend {
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(
            format!("http://{}/api", self.addr),
            format!("ws://{}/signaling", self.addr),
        )
    }

    pub fn script(&self, steps: impl IntoIterator<Item = StatusStep>) {
        self.state.status_script.lock().unwrap().extend(steps);
    }

    pub fn status_calls(&self) -> usize {
        self.state.status_calls.load(Ordering::SeqCst)
    }

    pub fn ws_connections(&self) -> usize {
        self.state.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ws_closed(&self) -> usize {
        self.state.ws_closed.load(Ordering::SeqCst)
    }

    pub fn ws_received(&self) -> Vec<Value> {
        self.state.ws_received.lock().unwrap().clone()
    }

    /// Push a frame to every live signaling connection.
    pub fn push_frame(&self, frame: Value) {
        let text = frame.to_string();
        let senders = self.state.ws_push.lock().unwrap();
        for sender in senders.iter() {
            let _ = sender.send(text.clone());
        }
    }

    /// Close every live signaling connection from the relay side.
    pub fn close_connections(&self) {
        self.state.ws_push.lock().unwrap().clear();
    }
}

pub async fn spawn_backend() -> StubBackend {
    let state = Arc::new(StubState::default());

    let app = Router::new()
        .route("/api/payments/status/{transaction_ref}", get(status_handler))
        .route("/api/payments/requests", post(create_handler))
        .route("/api/payments/{transaction_ref}/confirm", post(confirm_handler))
        .route("/signaling", get(ws_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubBackend { addr, state }
}

/// A listener that accepts TCP connections and immediately drops them,
/// so every HTTP attempt fails in transit.
pub struct DroppingListener {
    pub addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
}

impl DroppingListener {
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(
            format!("http://{}/api", self.addr),
            format!("ws://{}/signaling", self.addr),
        )
    }
}

pub async fn spawn_dropping_listener() -> DroppingListener {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));

    let counter = accepts.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    drop(socket);
                }
                Err(_) => break,
            }
        }
    });

    DroppingListener { addr, accepts }
}

pub fn storage_with_token() -> Arc<dyn StorageAdapter> {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(keys::TOKEN, TEST_TOKEN);
    storage
}

pub fn empty_storage() -> Arc<dyn StorageAdapter> {
    Arc::new(MemoryStorage::new())
}

/// Poller config scaled down so a full 24-attempt budget runs in well
/// under a second.
pub fn fast_poller() -> PollerConfig {
    PollerConfig {
        tick: Duration::from_millis(5),
        ..PollerConfig::default()
    }
}

/// Callback that appends every event to a shared vec.
pub fn event_sink() -> (impl FnMut(PollEvent) + Send + 'static, Arc<Mutex<Vec<PollEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    (
        move |event| sink.lock().unwrap().push(event),
        events,
    )
}

/// The state transitions observed so far, countdown ticks filtered out.
pub fn states(events: &Arc<Mutex<Vec<PollEvent>>>) -> Vec<PollState> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            PollEvent::State(state) => Some(state.clone()),
            PollEvent::Countdown(_) => None,
        })
        .collect()
}

/// Wait (up to 2 s) for a condition that the backend or a callback
/// flips asynchronously.
pub async fn wait_until(description: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {description}");
}

async fn status_handler(
    State(state): State<Arc<StubState>>,
    Path(_transaction_ref): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    record_authorization(&state, &headers);
    state.status_calls.fetch_add(1, Ordering::SeqCst);

    let step = state
        .status_script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(StatusStep::Pending);

    let (status, body) = match step {
        StatusStep::Pending => (
            StatusCode::OK,
            json!({ "isSuccess": true, "result": { "status": "Pending" } }),
        ),
        StatusStep::Completed(subscription) => (
            StatusCode::OK,
            json!({
                "isSuccess": true,
                "result": { "status": "Completed", "subscription": subscription },
            }),
        ),
        StatusStep::Declined(message) => (
            StatusCode::OK,
            json!({
                "isSuccess": true,
                "result": { "status": "Failed", "message": message },
            }),
        ),
        StatusStep::Unknown(raw) => (
            StatusCode::OK,
            json!({ "isSuccess": true, "result": { "status": raw } }),
        ),
        StatusStep::AppError(message) => (
            StatusCode::OK,
            json!({ "isSuccess": false, "errorMessages": [message] }),
        ),
        StatusStep::HttpError(code) => (
            StatusCode::from_u16(code).unwrap(),
            json!({}),
        ),
    };

    (status, Json(body))
}

async fn create_handler(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record_authorization(&state, &headers);
    state.create_bodies.lock().unwrap().push(body);

    Json(json!({
        "isSuccess": true,
        "result": {
            "transactionRef": "TX-TEST-1",
            "amount": 199000,
            "bankBin": "970422",
            "accountNumber": "0123456789",
            "accountName": "TELECARE JSC",
            "description": "TELECARE TX-TEST-1",
            "qrPayload": "00020101021238570010A000000727",
            "expiresAt": 1754600000,
        },
    }))
}

async fn confirm_handler(
    State(state): State<Arc<StubState>>,
    Path(_transaction_ref): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    record_authorization(&state, &headers);
    state.confirm_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "isSuccess": true }))
}

async fn ws_handler(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    state.connect_params.lock().unwrap().push(params);
    state.ws_connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<StubState>) {
    use futures::{SinkExt, StreamExt};

    let (mut sink, mut stream) = socket.split();

    let greetings = state.push_on_connect.lock().unwrap().clone();
    for frame in greetings {
        if sink.send(WsMessage::Text(frame.into())).await.is_err() {
            state.ws_closed.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }

    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();
    state.ws_push.lock().unwrap().push(push_tx);

    loop {
        tokio::select! {
            pushed = push_rx.recv() => {
                let Some(frame) = pushed else { break };
                if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else { break };
                let WsMessage::Text(text) = message else { continue };
                let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                    continue;
                };
                state.ws_received.lock().unwrap().push(value.clone());

                if state.relay_chat.load(Ordering::SeqCst) && value["type"] == "sendMessage" {
                    let reply = json!({
                        "type": "receiveMessage",
                        "senderId": value["userId"],
                        "message": value["message"],
                    });
                    if sink
                        .send(WsMessage::Text(reply.to_string().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    }

    state.ws_closed.fetch_add(1, Ordering::SeqCst);
}

fn record_authorization(state: &StubState, headers: &HeaderMap) {
    let value = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    *state.last_authorization.lock().unwrap() = value;
}
