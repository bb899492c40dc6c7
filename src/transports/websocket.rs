//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] is one open connection; [`WebSocketConnector`]
//! opens new ones against a fixed URL and is what
//! [`ReveriClient::start`](crate::ReveriClient::start) expects. `wss://`
//! URLs need one of `tokio-tungstenite`'s TLS features enabled.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is enabled
//! (it is enabled by default).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::ReveriError;
use crate::transport::{Connector, Transport};

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] implementation backed by a WebSocket connection.
///
/// Only text frames carry protocol envelopes. Binary frames are skipped,
/// ping/pong is answered by `tokio-tungstenite`, and a close frame ends the
/// stream.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes does not lose a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a new WebSocket connection to the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::Io`] if the URL is invalid or the connection
    /// cannot be established. I/O error kinds are preserved; everything else
    /// maps to [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, ReveriError> {
        tracing::debug!(url = %url, "connecting to WebSocket server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            ReveriError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "WebSocket connection established");

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established WebSocket stream.
    ///
    /// Useful for custom TLS, proxies, or extra handshake headers.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ReveriError> {
        if self.closed {
            return Err(ReveriError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ReveriError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ReveriError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(ReveriError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // tungstenite queues the pong reply itself.
                }
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ReveriError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| ReveriError::TransportSend(e.to_string()))
    }
}

/// A [`Connector`] that opens [`WebSocketTransport`]s to a fixed URL.
///
/// ```rust,no_run
/// use reveri_client::{ClientConfig, ReveriClient, WebSocketConnector};
///
/// # async fn example() {
/// let connector = WebSocketConnector::new("ws://127.0.0.1:8081");
/// let (client, events) = ReveriClient::start(connector, ClientConfig::new());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    /// Create a connector for the given `ws://` or `wss://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The URL every connection is opened against.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&mut self) -> Result<WebSocketTransport, ReveriError> {
        WebSocketTransport::connect(&self.url).await
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
        assert_send::<WebSocketConnector>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let result = WebSocketTransport::connect("not-a-valid-url").await;
        let err = result.unwrap_err();
        assert!(matches!(err, ReveriError::Io(_)));
    }

    #[tokio::test]
    async fn connector_fails_with_unreachable_host() {
        let mut connector = WebSocketConnector::new("ws://127.0.0.1:1");
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, ReveriError::Io(_)));
    }

    // ── Mock-stream helpers ──────────────────────────────────────────────

    use tokio::net::TcpListener;

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    // ── Mock-stream tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn recv_receives_text_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"message":"dashboard","payload":{}}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new(url).connect().await.unwrap();
        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(frame, r#"{"message":"dashboard","payload":{}}"#);
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn binary_frames_do_not_reach_decoder() {
        let chat = r#"{"message":"game_chat","payload":{"author":null,"text":"Game started!"}}"#;
        let url = start_mock_server(move |mut ws| async move {
            ws.send(Message::Binary(vec![0x7B, 0x7D].into()))
                .await
                .unwrap();
            ws.send(Message::Text(chat.into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new(url).connect().await.unwrap();
        let frame = transport.recv().await.unwrap().unwrap();
        let msg = crate::protocol::ServerMessage::decode(&frame).unwrap();
        assert_eq!(msg.kind(), "game_chat");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn commands_after_close_are_rejected() {
        let url = start_mock_server(|mut ws| async move {
            // Drain until the client hangs up.
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketConnector::new(url).connect().await.unwrap();
        transport.close().await.unwrap();
        // Closing twice is harmless.
        transport.close().await.unwrap();

        let login = crate::protocol::ClientCommand::Login {
            username: "alice".into(),
        };
        let err = transport.send(login.encode().unwrap()).await.unwrap_err();
        assert!(matches!(err, ReveriError::TransportClosed));
    }

    #[tokio::test]
    async fn send_reaches_server() {
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .send(r#"{"method":"new_game","payload":{}}"#.to_string())
            .await
            .unwrap();

        let echoed = transport.recv().await.unwrap().unwrap();
        assert_eq!(echoed, r#"{"method":"new_game","payload":{}}"#);
    }
}
