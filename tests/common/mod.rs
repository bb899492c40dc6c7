#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Reveri client integration tests.
//!
//! Provides a scripted [`MockConnector`] handing out [`MockTransport`]s, and
//! helpers that build server frames the way the real server shapes them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use reveri_client::backoff::ReconnectPolicy;
use reveri_client::{ClientConfig, ClientEvent, Connector, ReveriClient, ReveriError, Transport};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

/// One scripted inbound item: a frame, a receive error, or `None` for a clean close.
pub type Incoming = Option<Result<String, ReveriError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// Scripted server frames are consumed in order by `recv()`; everything the
/// client sends is recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Incoming>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    /// When set, every `send()` waits this long and then fails.
    failing_send: Option<Duration>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ReveriError> {
        if let Some(delay) = self.failing_send {
            tokio::time::sleep(delay).await;
            return Err(ReveriError::TransportSend("connection reset".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ReveriError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // Script exhausted: stay open until the client closes us.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), ReveriError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Hands out one scripted transport per `connect()` call and counts calls.
/// Once the scripts run out, `connect()` never completes.
pub struct MockConnector {
    scripts: VecDeque<Vec<Incoming>>,
    failing_send: Option<Duration>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
    pub connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(scripts: Vec<Vec<Incoming>>) -> Self {
        Self {
            scripts: VecDeque::from(scripts),
            failing_send: None,
            sent: Arc::new(StdMutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Transports from this connector fail every send after `delay`.
    pub fn with_failing_send(mut self, delay: Duration) -> Self {
        self.failing_send = Some(delay);
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&mut self) -> Result<MockTransport, ReveriError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.scripts.pop_front() {
            Some(script) => Ok(MockTransport {
                incoming: VecDeque::from(script),
                sent: Arc::clone(&self.sent),
                closed: Arc::clone(&self.closed),
                failing_send: self.failing_send,
            }),
            None => std::future::pending().await,
        }
    }
}

// ── Client harness ──────────────────────────────────────────────────

pub struct Harness {
    pub client: ReveriClient,
    pub events: mpsc::Receiver<ClientEvent>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
    pub connects: Arc<AtomicUsize>,
}

impl Harness {
    /// Next event, failing the test if none arrives within two seconds.
    pub async fn next_event(&mut self) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Skip events until one matches `pred`, returning it.
    pub async fn wait_for(&mut self, pred: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
        loop {
            let event = self.next_event().await;
            if pred(&event) {
                return event;
            }
        }
    }

    /// Sent frames parsed as JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

/// Start a client over scripted connections, retrying immediately.
pub fn start_client(scripts: Vec<Vec<Incoming>>) -> Harness {
    start_with(MockConnector::new(scripts))
}

/// Start a client over a prepared connector, retrying immediately.
pub fn start_with(connector: MockConnector) -> Harness {
    let sent = Arc::clone(&connector.sent);
    let closed = Arc::clone(&connector.closed);
    let connects = Arc::clone(&connector.connects);
    let config = ClientConfig::new()
        .with_reconnect_policy(ReconnectPolicy::immediate())
        .with_shutdown_timeout(Duration::from_millis(200));
    let (client, events) = ReveriClient::start(connector, config);
    Harness {
        client,
        events,
        sent,
        closed,
        connects,
    }
}

/// Give the connection loop time to drain queued commands.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ── Frame helpers ───────────────────────────────────────────────────

pub fn frame(message: &str, payload: Value) -> Incoming {
    Some(Ok(json!({ "message": message, "payload": payload }).to_string()))
}

pub fn raw(text: &str) -> Incoming {
    Some(Ok(text.to_string()))
}

pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn start_frame(username: &str) -> Incoming {
    frame("start", json!({ "username": username }))
}

pub fn player_json(n: u128, username: &str) -> Value {
    json!({ "uuid": id(n), "username": username })
}

pub fn room_json(n: u128) -> Value {
    json!({ "uuid": id(n), "players": {}, "is_running": false })
}

/// A `rooms` snapshot payload containing the given room ids.
pub fn rooms_json(ids: &[u128]) -> Value {
    let map: serde_json::Map<String, Value> = ids
        .iter()
        .map(|&n| (id(n).to_string(), room_json(n)))
        .collect();
    Value::Object(map)
}

/// A `players` snapshot payload.
pub fn players_json(players: &[(u128, &str)]) -> Value {
    let map: serde_json::Map<String, Value> = players
        .iter()
        .map(|&(n, name)| (id(n).to_string(), player_json(n, name)))
        .collect();
    Value::Object(map)
}

/// What the server sends right after a successful login.
pub fn login_script(username: &str) -> Vec<Incoming> {
    vec![
        frame("players", players_json(&[(1, username)])),
        frame("rooms", rooms_json(&[])),
        start_frame(username),
    ]
}

pub fn game_enter_frame(index: u8, game: u128) -> Incoming {
    frame("game_enter", json!({ "index": index, "game_uuid": id(game) }))
}

pub fn game_state_frame(score: [u32; 2], order: u8) -> Incoming {
    frame(
        "game_state",
        json!({
            "board": [{ "line": 0, "values": [{ "index": 0, "x": 0, "y": 0, "value": -1 }] }],
            "score": score,
            "order": order,
        }),
    )
}

pub fn chat_frame(author: Option<&str>, text: &str) -> Incoming {
    frame("game_chat", json!({ "author": author, "text": text }))
}
