//! Async client for the Reveri lobby and game server.
//!
//! [`ReveriClient`] is a thin handle that talks to a background connection
//! loop over an unbounded MPSC channel. The loop owns the connection, the
//! mirrored [`ClientState`] and the dispatcher; it handles one transport
//! event at a time, so state changes never interleave.
//!
//! Viewers read state through [`ReveriClient::state`] (a `watch` receiver
//! updated after every reaction step) and receive [`ClientEvent`]s on the
//! bounded channel returned from [`ReveriClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("ws://127.0.0.1:8081");
//! let (client, mut events) = ReveriClient::start(connector, ClientConfig::new());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Connected => client.login("alice")?,
//!         ClientEvent::ViewChanged { view: View::Dashboard } => client.new_game()?,
//!         ClientEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, ReconnectPolicy};
use crate::dispatch;
use crate::error::{Result, ReveriError};
use crate::event::ClientEvent;
use crate::protocol::{ClientCommand, RoomId};
use crate::session::{self, CloseOutcome, Gate};
use crate::state::{ClientState, ConnectionPhase, View};
use crate::transport::{Connector, Transport, TransportEvent};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default timeout for a single connection attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const SHUTDOWN_REASON: &str = "client shut down";

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ReveriClient`].
///
/// # Example
///
/// ```
/// use reveri_client::backoff::ReconnectPolicy;
/// use reveri_client::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new()
///     .with_event_channel_capacity(512)
///     .with_connect_timeout(Duration::from_secs(3))
///     .with_reconnect_policy(ReconnectPolicy::default().with_max_attempts(10));
/// assert_eq!(config.event_channel_capacity, 512);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped with a warning so
    /// the connection loop never blocks. `Disconnected` is always delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time [`ReveriClient::shutdown`] waits for the loop to close the
    /// transport before aborting it. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Upper bound for one connection attempt. A timed-out attempt counts as
    /// a failed attempt. Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Retry schedule for connections lost before login.
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Set the capacity of the bounded event channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// Requests from the handle to the connection loop.
#[derive(Debug)]
enum Command {
    Send(ClientCommand),
    Reconnect,
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the Reveri server.
///
/// Created via [`ReveriClient::start`]. Outbound methods queue a command for
/// the connection loop and return immediately; results arrive as server
/// messages and show up in [`state`](Self::state) and the event channel.
pub struct ReveriClient {
    /// Sender half of the command channel to the connection loop.
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Latest state published by the connection loop.
    state_rx: watch::Receiver<ClientState>,
    /// Handle to the background connection loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the connection loop to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ReveriClient {
    /// Spawn the connection loop and return a handle plus event receiver.
    ///
    /// The loop opens the first connection right away. The event receiver
    /// yields [`ClientEvent`]s until the client stops; the last one is always
    /// [`ClientEvent::Disconnected`].
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start<C: Connector>(
        connector: C,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (state_tx, state_rx) = watch::channel(ClientState::default());

        let connection = ConnectionLoop {
            connector,
            cmd_rx,
            event_tx,
            state_tx,
            shutdown_rx,
            state: ClientState::default(),
            backoff: Backoff::new(config.reconnect),
            connect_timeout: config.connect_timeout,
        };
        let task = tokio::spawn(connection.run());

        let client = Self {
            cmd_tx,
            state_rx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Log in with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::NotConnected`] if no connection is open.
    pub fn login(&self, username: impl Into<String>) -> Result<()> {
        self.send(ClientCommand::Login {
            username: username.into(),
        })
    }

    /// Create a new game and take its first seat.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::NotConnected`] if no connection is open.
    pub fn new_game(&self) -> Result<()> {
        self.send(ClientCommand::NewGame {})
    }

    /// Take a free seat in an existing game.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::NotConnected`] if no connection is open.
    pub fn enter_game(&self, game_uuid: RoomId) -> Result<()> {
        self.send(ClientCommand::EnterGame { game_uuid })
    }

    /// Leave the current game.
    ///
    /// The in-game flag is cleared as soon as the command is sent, without
    /// waiting for the server.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::NotConnected`] if no connection is open.
    pub fn exit_game(&self) -> Result<()> {
        self.send(ClientCommand::ExitGame {})
    }

    /// Post a chat line to the current game.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::NotConnected`] if no connection is open.
    pub fn chat(&self, text: impl Into<String>) -> Result<()> {
        self.send(ClientCommand::Chat { text: text.into() })
    }

    /// Place a piece at `(x, y)`.
    ///
    /// Silently dropped when the last board update did not give this client
    /// the turn. This is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::NotConnected`] if no connection is open.
    pub fn turn(&self, x: u8, y: u8) -> Result<()> {
        self.send(ClientCommand::Turn { x, y })
    }

    /// Open a fresh connection, replacing the current one if any.
    ///
    /// This is the way back after [`ClientEvent::SessionInvalidated`]; the
    /// new connection starts logged out.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::NotConnected`] if the connection loop has stopped.
    pub fn reconnect(&self) -> Result<()> {
        self.cmd_tx
            .send(Command::Reconnect)
            .map_err(|_| ReveriError::NotConnected)
    }

    /// Shut down the client, closing the transport and stopping the background task.
    pub async fn shutdown(&mut self) {
        debug!("ReveriClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the loop with a timeout; abort it if it does not exit in time.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection loop aborted: {join_err}");
                    }
                }
            }
        }
    }

    // ── State accessors ─────────────────────────────────────────────

    /// A receiver for the mirrored state. Use `changed().await` to wait for
    /// the next update.
    pub fn state(&self) -> watch::Receiver<ClientState> {
        self.state_rx.clone()
    }

    /// Returns `true` if a connection is open.
    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// Returns `true` if the server acknowledged a login on this connection.
    pub fn is_authenticated(&self) -> bool {
        self.state_rx.borrow().is_authenticated()
    }

    /// The screen the host application should show.
    pub fn view(&self) -> View {
        self.state_rx.borrow().view()
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a command for the connection loop.
    fn send(&self, command: ClientCommand) -> Result<()> {
        if !self.is_connected() {
            return Err(ReveriError::NotConnected);
        }
        self.cmd_tx
            .send(Command::Send(command))
            .map_err(|_| ReveriError::NotConnected)
    }
}

impl std::fmt::Debug for ReveriClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReveriClient")
            .field("connected", &self.is_connected())
            .field("authenticated", &self.is_authenticated())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ReveriClient {
    fn drop(&mut self) {
        // No executor is available to drive a graceful close here.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Connection loop ─────────────────────────────────────────────────

/// What the connection loop does next.
#[derive(Debug)]
enum Next {
    /// Open a new connection.
    Connect,
    /// No connection. Retry after the delay, or wait for an explicit
    /// reconnect when `None`.
    Idle { retry_after: Option<Duration> },
    /// Stop the loop and emit `Disconnected`.
    Stop { reason: Option<String> },
}

impl Next {
    fn shutdown() -> Self {
        Self::Stop {
            reason: Some(SHUTDOWN_REASON.to_string()),
        }
    }
}

/// Background task owning the connection and the mirrored state.
struct ConnectionLoop<C: Connector> {
    connector: C,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<ClientEvent>,
    state_tx: watch::Sender<ClientState>,
    shutdown_rx: oneshot::Receiver<()>,
    state: ClientState,
    backoff: Backoff,
    connect_timeout: Duration,
}

impl<C: Connector> ConnectionLoop<C> {
    async fn run(mut self) {
        debug!("connection loop started");

        let mut next = Next::Connect;
        loop {
            next = match next {
                Next::Connect => self.open_connection().await,
                Next::Idle { retry_after } => self.idle(retry_after).await,
                Next::Stop { reason } => {
                    self.state.set_phase(ConnectionPhase::Closed);
                    self.publish();
                    self.emit_disconnected(reason).await;
                    break;
                }
            };
        }

        debug!("connection loop exited");
    }

    /// Open one connection and serve it until it ends.
    async fn open_connection(&mut self) -> Next {
        let previous_view = self.state.view();
        session::begin_connect(&mut self.state);
        self.publish();
        if previous_view != View::Login {
            self.emit_event(ClientEvent::ViewChanged { view: View::Login });
        }

        let attempt = tokio::select! {
            result = tokio::time::timeout(self.connect_timeout, self.connector.connect()) => result,
            _ = &mut self.shutdown_rx => return Next::shutdown(),
        };

        match attempt {
            Ok(Ok(transport)) => self.serve(transport).await,
            Ok(Err(e)) => {
                warn!("connection attempt failed: {e}");
                self.attempt_failed(Some(e.to_string()))
            }
            Err(_) => {
                warn!(timeout = ?self.connect_timeout, "connection attempt timed out");
                self.attempt_failed(Some(ReveriError::Timeout.to_string()))
            }
        }
    }

    /// Multiplex outbound commands and inbound frames on one connection.
    async fn serve(&mut self, mut transport: C::Transport) -> Next {
        if let Some(next) = self.on_transport_event(TransportEvent::Opened) {
            return next;
        }

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Send(command)) => {
                            if let Err(e) = self.send_command(&mut transport, command).await {
                                error!("transport send error: {e}");
                                let _ = transport.close().await;
                                let closed = TransportEvent::Closed {
                                    reason: Some(format!("transport send error: {e}")),
                                };
                                if let Some(next) = self.on_transport_event(closed) {
                                    return next;
                                }
                            }
                        }
                        Some(Command::Reconnect) => {
                            info!("reconnect requested, replacing connection");
                            let _ = transport.close().await;
                            self.backoff.reset();
                            return Next::Connect;
                        }
                        // Command channel closed: the client handle was dropped.
                        None => {
                            debug!("command channel closed, shutting down connection loop");
                            let _ = transport.close().await;
                            return Next::shutdown();
                        }
                    }
                }

                _ = &mut self.shutdown_rx => {
                    debug!("shutdown signal received");
                    let _ = transport.close().await;
                    return Next::shutdown();
                }

                incoming = transport.recv() => {
                    if let Some(next) = self.on_transport_event(TransportEvent::from_recv(incoming)) {
                        return next;
                    }
                }
            }
        }
    }

    /// React to one transport event. Returns `Some` when the connection ended.
    fn on_transport_event(&mut self, event: TransportEvent) -> Option<Next> {
        match event {
            TransportEvent::Opened => {
                info!("connection open");
                session::connection_opened(&mut self.state);
                self.publish();
                self.emit_event(ClientEvent::Connected);
                None
            }
            TransportEvent::Message(text) => {
                let events = dispatch::handle_frame(&mut self.state, &text);
                self.publish();
                for event in events {
                    if matches!(event, ClientEvent::Authenticated { .. }) {
                        self.backoff.reset();
                    }
                    self.emit_event(event);
                }
                None
            }
            TransportEvent::Closed { reason } => {
                match &reason {
                    Some(reason) => warn!("connection closed: {reason}"),
                    None => info!("connection closed by server"),
                }
                let reconnect_requested = self.drop_stale_commands();
                let outcome = session::connection_closed(&mut self.state);
                self.publish();
                if outcome == CloseOutcome::SessionInvalidated {
                    self.emit_event(ClientEvent::SessionInvalidated);
                    self.emit_event(ClientEvent::ViewChanged { view: View::Login });
                }
                if reconnect_requested {
                    info!("reconnect was requested before the close, reconnecting");
                    self.backoff.reset();
                    return Some(Next::Connect);
                }
                Some(match outcome {
                    CloseOutcome::SessionInvalidated => Next::Idle { retry_after: None },
                    CloseOutcome::Retry => self.retry_or_stop(reason),
                })
            }
        }
    }

    /// Gate, encode and transmit one command.
    async fn send_command(
        &mut self,
        transport: &mut C::Transport,
        command: ClientCommand,
    ) -> Result<()> {
        if session::prepare_command(&mut self.state, &command) == Gate::Suppress {
            return Ok(());
        }
        self.publish();

        let frame = match command.encode() {
            Ok(frame) => frame,
            Err(e) => {
                // Encoding failures are programming bugs; keep the connection.
                error!(method = command.method(), "failed to serialize command: {e}");
                return Ok(());
            }
        };
        debug!(method = command.method(), "sending command");
        transport.send(frame).await
    }

    /// No live connection: wait for the retry timer, an explicit reconnect,
    /// or shutdown.
    async fn idle(&mut self, retry_after: Option<Duration>) -> Next {
        let timer = async move {
            match retry_after {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return Next::Connect,
                _ = &mut self.shutdown_rx => return Next::shutdown(),
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Reconnect) => {
                        self.backoff.reset();
                        return Next::Connect;
                    }
                    Some(Command::Send(command)) => {
                        warn!(method = command.method(), "no open connection, dropping command");
                    }
                    None => return Next::shutdown(),
                },
            }
        }
    }

    /// A connection attempt never opened. Viewers see `Closed` while the
    /// retry timer runs.
    fn attempt_failed(&mut self, reason: Option<String>) -> Next {
        self.state.set_phase(ConnectionPhase::Closed);
        self.publish();
        self.retry_or_stop(reason)
    }

    fn retry_or_stop(&mut self, reason: Option<String>) -> Next {
        match self.backoff.next_delay() {
            Some(delay) => {
                let attempt = self.backoff.attempt();
                debug!(attempt, ?delay, "scheduling reconnect");
                self.emit_event(ClientEvent::Reconnecting { attempt, delay });
                Next::Idle {
                    retry_after: Some(delay),
                }
            }
            None => {
                warn!("reconnect attempts exhausted");
                Next::Stop {
                    reason: reason.or_else(|| Some("reconnect attempts exhausted".into())),
                }
            }
        }
    }

    /// Commands queued for a connection that has since closed must not leak
    /// onto the next one. A queued reconnect is kept: returns `true` if one
    /// was pending.
    fn drop_stale_commands(&mut self) -> bool {
        let mut reconnect_requested = false;
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            match cmd {
                Command::Send(command) => {
                    debug!(method = command.method(), "dropping command queued for closed connection");
                }
                Command::Reconnect => reconnect_requested = true,
            }
        }
        reconnect_requested
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    /// Emit an event. If the channel is full, log a warning and drop the
    /// event to avoid blocking the loop.
    fn emit_event(&self, event: ClientEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("event channel full, dropping event: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    /// `Disconnected` is the last event and must never be dropped, so this
    /// waits for channel capacity.
    ///
    /// Takes `&mut self`: the connector is not `Sync`, so a shared borrow of
    /// the loop held across the await would make the task future `!Send`.
    async fn emit_disconnected(&mut self, reason: Option<String>) {
        let event = ClientEvent::Disconnected { reason };
        if self.event_tx.send(event).await.is_err() {
            debug!("event channel closed, receiver dropped");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    type Script = Vec<Option<std::result::Result<String, ReveriError>>>;

    // ── Mock transport ──────────────────────────────────────────────

    /// Replays scripted frames and records sent ones.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, ReveriError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ReveriError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ReveriError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), ReveriError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Hands out one scripted transport per `connect()`; hangs once the
    /// scripts run out.
    struct MockConnector {
        scripts: VecDeque<Script>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        connects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(&mut self) -> std::result::Result<MockTransport, ReveriError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.scripts.pop_front() {
                Some(script) => Ok(MockTransport {
                    incoming: VecDeque::from(script),
                    sent: Arc::clone(&self.sent),
                    closed: Arc::clone(&self.closed),
                }),
                None => std::future::pending().await,
            }
        }
    }

    struct Harness {
        client: ReveriClient,
        events: mpsc::Receiver<ClientEvent>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        connects: Arc<AtomicUsize>,
    }

    fn start(scripts: Vec<Script>) -> Harness {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let connects = Arc::new(AtomicUsize::new(0));
        let connector = MockConnector {
            scripts: VecDeque::from(scripts),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
            connects: Arc::clone(&connects),
        };
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

    fn frame(message: &str, payload: serde_json::Value) -> Option<std::result::Result<String, ReveriError>> {
        Some(Ok(serde_json::json!({ "message": message, "payload": payload }).to_string()))
    }

    fn start_frame() -> Option<std::result::Result<String, ReveriError>> {
        frame("start", serde_json::json!({ "username": "alice" }))
    }

    async fn next_event(events: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event() {
        let mut h = start(vec![vec![]]);
        let first = next_event(&mut h.events).await;
        assert!(matches!(first, ClientEvent::Connected), "got {first:?}");
        assert!(h.client.is_connected());
        assert!(!h.client.is_authenticated());
        h.client.shutdown().await;
    }

    #[tokio::test]
    async fn start_frame_authenticates_and_navigates() {
        let mut h = start(vec![vec![start_frame()]]);
        assert!(matches!(next_event(&mut h.events).await, ClientEvent::Connected));
        assert_eq!(
            next_event(&mut h.events).await,
            ClientEvent::Authenticated {
                username: "alice".into()
            }
        );
        assert_eq!(
            next_event(&mut h.events).await,
            ClientEvent::ViewChanged {
                view: View::Dashboard
            }
        );
        assert!(h.client.is_authenticated());
        assert_eq!(h.client.view(), View::Dashboard);
        h.client.shutdown().await;
    }

    #[tokio::test]
    async fn login_sends_envelope() {
        let mut h = start(vec![vec![]]);
        let _ = next_event(&mut h.events).await; // Connected
        h.client.login("alice").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let sent = h.sent.lock().unwrap();
            let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
            assert_eq!(
                value,
                serde_json::json!({ "method": "login", "payload": { "username": "alice" } })
            );
        }
        h.client.shutdown().await;
    }

    #[tokio::test]
    async fn close_before_login_reconnects_once() {
        let mut h = start(vec![vec![None]]);
        assert!(matches!(next_event(&mut h.events).await, ClientEvent::Connected));
        assert!(matches!(
            next_event(&mut h.events).await,
            ClientEvent::Reconnecting { attempt: 1, .. }
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.connects.load(Ordering::SeqCst), 2);
        h.client.shutdown().await;
    }

    #[tokio::test]
    async fn close_after_login_invalidates_without_reconnect() {
        let mut h = start(vec![vec![start_frame(), None]]);
        let _ = next_event(&mut h.events).await; // Connected
        let _ = next_event(&mut h.events).await; // Authenticated
        let _ = next_event(&mut h.events).await; // ViewChanged(Dashboard)
        assert_eq!(
            next_event(&mut h.events).await,
            ClientEvent::SessionInvalidated
        );
        assert_eq!(
            next_event(&mut h.events).await,
            ClientEvent::ViewChanged { view: View::Login }
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.connects.load(Ordering::SeqCst), 1);
        assert!(!h.client.is_authenticated());
        assert!(matches!(h.client.login("bob"), Err(ReveriError::NotConnected)));
        h.client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected_and_closes_transport() {
        let mut h = start(vec![vec![]]);
        let _ = next_event(&mut h.events).await; // Connected
        h.client.shutdown().await;

        let event = next_event(&mut h.events).await;
        assert_eq!(
            event,
            ClientEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert!(h.closed.load(Ordering::Relaxed));
        assert!(h.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn exhausted_policy_stops_loop() {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let connector = MockConnector {
            scripts: VecDeque::from(vec![vec![None]]),
            sent,
            closed: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
        };
        let config = ClientConfig::new()
            .with_reconnect_policy(ReconnectPolicy::immediate().with_max_attempts(0));
        let (_client, mut events) = ReveriClient::start(connector, config);

        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));
        assert!(matches!(
            next_event(&mut events).await,
            ClientEvent::Disconnected { .. }
        ));
    }

    /// Wraps the mock with a `Cell`, making the connector `!Sync`.
    struct UnsyncConnector {
        inner: MockConnector,
        _not_sync: std::cell::Cell<u8>,
    }

    #[async_trait]
    impl Connector for UnsyncConnector {
        type Transport = MockTransport;

        async fn connect(&mut self) -> std::result::Result<MockTransport, ReveriError> {
            self.inner.connect().await
        }
    }

    #[tokio::test]
    async fn connector_need_not_be_sync() {
        let connector = UnsyncConnector {
            inner: MockConnector {
                scripts: VecDeque::from(vec![vec![]]),
                sent: Arc::new(StdMutex::new(Vec::new())),
                closed: Arc::new(AtomicBool::new(false)),
                connects: Arc::new(AtomicUsize::new(0)),
            },
            _not_sync: std::cell::Cell::new(0),
        };
        let (mut client, mut events) = ReveriClient::start(connector, ClientConfig::new());
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

        client.shutdown().await;
        assert!(matches!(
            next_event(&mut events).await,
            ClientEvent::Disconnected { .. }
        ));
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect, ReconnectPolicy::default());
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = ClientConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let mut h = start(vec![vec![]]);
        let _ = next_event(&mut h.events).await;
        let debug_str = format!("{:?}", h.client);
        assert!(debug_str.contains("ReveriClient"));
        assert!(debug_str.contains("connected"));
        h.client.shutdown().await;
    }
}
