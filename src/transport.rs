//! Transport abstraction for the Reveri protocol.
//!
//! The [`Transport`] trait defines a bidirectional text message channel between
//! the client and server. Every frame is one JSON envelope, so each
//! implementation handles message framing internally (WebSocket frames,
//! length-prefixed TCP, in-process channels for tests).
//!
//! # Connection Setup
//!
//! A [`Transport`] is one already-open connection. Opening connections is the
//! job of a [`Connector`]: the client keeps a single connector and asks it for
//! a fresh transport on start, after a pre-login connection drop, and on an
//! explicit `reconnect()`. Only one transport is live at any time.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use reveri_client::error::ReveriError;
//! use reveri_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ReveriError> {
//!         // Send the JSON text frame over your transport
//!         Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ReveriError>> {
//!         // Return None when the connection is closed cleanly
//!         None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ReveriError> {
//!         Ok(())
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&mut self) -> Result<MyTransport, ReveriError> {
//!         Ok(MyTransport { /* ... */ })
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ReveriError;

/// A bidirectional text message transport for the Reveri protocol.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON frame.
/// Each call to [`recv`](Transport::recv) returns one complete JSON frame.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::TransportSend`] if the frame could not be sent.
    async fn send(&mut self, message: String) -> Result<(), ReveriError>;

    /// Receive the next JSON text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed cleanly by the server
    async fn recv(&mut self) -> Option<Result<String, ReveriError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources in that case.
    async fn close(&mut self) -> Result<(), ReveriError>;
}

/// Opens new [`Transport`] connections to one server.
#[async_trait]
pub trait Connector: Send + 'static {
    /// The transport produced by this connector.
    type Transport: Transport;

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or the handshake fails.
    async fn connect(&mut self) -> Result<Self::Transport, ReveriError>;
}

/// Lifecycle events of the live connection, consumed one at a time by the
/// client's connection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection was established. Informational only.
    Opened,
    /// A raw inbound text frame.
    Message(String),
    /// The connection ended. `reason` is `None` for a clean close.
    Closed { reason: Option<String> },
}

impl TransportEvent {
    /// Map the result of [`Transport::recv`] onto a lifecycle event.
    pub fn from_recv(incoming: Option<Result<String, ReveriError>>) -> Self {
        match incoming {
            Some(Ok(text)) => Self::Message(text),
            Some(Err(e)) => Self::Closed {
                reason: Some(e.to_string()),
            },
            None => Self::Closed { reason: None },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio_test::{assert_err, assert_ok, block_on};

    /// In-memory transport that hands every sent frame back to `recv`.
    struct Loopback {
        queue: VecDeque<String>,
        open: bool,
    }

    #[async_trait]
    impl Transport for Loopback {
        async fn send(&mut self, message: String) -> Result<(), ReveriError> {
            if !self.open {
                return Err(ReveriError::TransportClosed);
            }
            self.queue.push_back(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String, ReveriError>> {
            if !self.open {
                return None;
            }
            self.queue.pop_front().map(Ok)
        }

        async fn close(&mut self) -> Result<(), ReveriError> {
            self.open = false;
            Ok(())
        }
    }

    #[test]
    fn recv_results_map_to_lifecycle_events() {
        block_on(async {
            let mut transport = Loopback {
                queue: VecDeque::new(),
                open: true,
            };
            let frame = r#"{"message":"dashboard","payload":{}}"#.to_string();
            assert_ok!(transport.send(frame.clone()).await);
            assert_eq!(
                TransportEvent::from_recv(transport.recv().await),
                TransportEvent::Message(frame)
            );

            assert_ok!(transport.close().await);
            assert_eq!(
                TransportEvent::from_recv(transport.recv().await),
                TransportEvent::Closed { reason: None }
            );
            assert_err!(transport.send("late".into()).await);
        });
    }

    #[test]
    fn recv_error_maps_to_closed_with_reason() {
        let event = TransportEvent::from_recv(Some(Err(ReveriError::TransportReceive(
            "reset".into(),
        ))));
        assert_eq!(
            event,
            TransportEvent::Closed {
                reason: Some("transport receive error: reset".into())
            }
        );
    }

    #[test]
    fn clean_close_has_no_reason() {
        assert_eq!(
            TransportEvent::from_recv(None),
            TransportEvent::Closed { reason: None }
        );
    }
}
