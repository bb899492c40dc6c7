//! Events emitted by the client's connection loop.
//!
//! Events describe what changed; the full state after the change is always
//! available from [`ReveriClient::state`](crate::ReveriClient::state).

use std::time::Duration;

use crate::error_codes::ServerErrorKind;
use crate::protocol::{RoomId, Seat};
use crate::state::{ChatEntry, View};

/// Notifications delivered on the channel returned by
/// [`ReveriClient::start`](crate::ReveriClient::start).
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A connection was opened. Informational only; log in next.
    Connected,
    /// The server acknowledged the login.
    Authenticated { username: String },
    /// The host application should switch screens.
    ViewChanged { view: View },
    /// Rooms or players changed. Counts are taken after the change.
    LobbyUpdated {
        games_count: usize,
        players_count: usize,
    },
    /// This client took seat `index` in game `game_uuid`.
    GameEntered { index: Seat, game_uuid: RoomId },
    GameStarted,
    GameStopped,
    ChatReceived(ChatEntry),
    /// A new board arrived. `order` is `true` when it is this client's turn.
    GameStateUpdated { score: [u32; 2], order: bool },
    /// The server rejected a command. The session stays open.
    ServerError {
        kind: ServerErrorKind,
        args: serde_json::Value,
    },
    /// A logged-in connection was lost. Call
    /// [`ReveriClient::reconnect`](crate::ReveriClient::reconnect) and log in again.
    SessionInvalidated,
    /// A pre-login connection was lost; retry `attempt` starts after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The client stopped for good. Always the last event.
    Disconnected { reason: Option<String> },
}
