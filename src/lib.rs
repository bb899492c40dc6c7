//! # Reveri Client
//!
//! Async realtime client for the Reveri lobby and turn-based board game server.
//!
//! The client keeps a local mirror of server-authoritative state (lobby rooms,
//! connected players, the game in progress) synchronized over one persistent
//! connection, and issues commands (login, create/join game, chat, move) back
//! to the server.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **Wire-compatible**: JSON envelopes with the server's exact field names
//! - **WebSocket built-in**: default `transport-websocket` feature provides
//!   `WebSocketTransport` and `WebSocketConnector`
//! - **Single-consumer dispatch**: one background task applies server
//!   messages in order; viewers read snapshots via a `watch` channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), reveri_client::ReveriError> {
//! use reveri_client::{ClientConfig, ClientEvent, ReveriClient, View, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new("ws://127.0.0.1:8081");
//! let (mut client, mut events) = ReveriClient::start(connector, ClientConfig::new());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Connected => client.login("alice")?,
//!         ClientEvent::ViewChanged { view: View::Dashboard } => {
//!             let lobby = client.state().borrow().lobby().games_count();
//!             println!("{lobby} game(s) open");
//!         }
//!         ClientEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
#[cfg(feature = "tokio-runtime")]
pub mod client;
mod dispatch;
pub mod error;
pub mod error_codes;
pub mod event;
pub mod protocol;
mod session;
pub mod state;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
#[cfg(feature = "tokio-runtime")]
pub use client::{ClientConfig, ReveriClient};
pub use error::ReveriError;
pub use error_codes::ServerErrorKind;
pub use event::ClientEvent;
pub use protocol::{ClientCommand, ServerMessage};
pub use state::{ClientState, View};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
