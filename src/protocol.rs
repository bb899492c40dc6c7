//! Wire-compatible protocol types for the Reveri lobby and game server.
//!
//! Every frame is a UTF-8 JSON text message wrapped in an envelope:
//!
//! - client → server: `{"method": <string>, "payload": <object>}`
//! - server → client: `{"message": <string>, "payload": <object>}`
//!
//! Field names are transmitted verbatim (`game_uuid`, `is_running`, …) so the
//! client interoperates with the existing server regardless of local naming.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, ReveriError};
use crate::error_codes::ServerErrorKind;

// ── Type aliases ────────────────────────────────────────────────────

/// Unique identifier for players.
pub type PlayerId = Uuid;

/// Unique identifier for rooms (a room hosts exactly one game).
pub type RoomId = Uuid;

/// Seat number assigned by the server when entering a game.
pub type Seat = u8;

// ── Lobby entities ──────────────────────────────────────────────────

/// A connected player as listed in the lobby.
///
/// Fields other than `uuid` and `username` are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub uuid: PlayerId,
    #[serde(default)]
    pub username: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A lobby room hosting one game.
///
/// Fields the client does not interpret are kept in `extra` so they reach
/// viewers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub uuid: RoomId,
    /// Players seated in the room, keyed by player uuid.
    #[serde(default)]
    pub players: HashMap<PlayerId, Player>,
    /// `true` once both seats are taken.
    #[serde(default)]
    pub is_running: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Payload structs ─────────────────────────────────────────────────

/// Payload of `start`, the first message after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPayload {
    pub username: String,
}

/// Payload of `*_delete` messages. Only the key is read; the server may
/// send the full entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub uuid: Uuid,
}

/// Payload of `game_enter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnterPayload {
    /// Seat assigned to this client.
    pub index: Seat,
    pub game_uuid: RoomId,
}

/// Payload of `game_chat`. A `null` author marks a system message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameChatPayload {
    #[serde(default)]
    pub author: Option<String>,
    pub text: String,
}

/// Payload of `game_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatePayload {
    /// Server-defined board structure, kept opaque.
    pub board: Value,
    pub score: [u32; 2],
    /// Seat that owns the current turn.
    pub order: Seat,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(rename = "type")]
    pub kind: ServerErrorKind,
    #[serde(default)]
    pub args: Value,
}

// ── Outbound ────────────────────────────────────────────────────────

/// Commands sent from client to server.
///
/// Serializes to the outbound envelope; every variant carries an object
/// payload, including the empty ones (`{}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "payload", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Log in with a display name. Must be the first command on a connection.
    Login { username: String },
    /// Create a new room and take its first seat.
    NewGame {},
    /// Take a free seat in an existing room.
    EnterGame { game_uuid: RoomId },
    /// Leave the current game.
    #[serde(rename = "exit")]
    ExitGame {},
    /// Post a chat line to the current game.
    Chat { text: String },
    /// Place a piece at `(x, y)`.
    Turn { x: u8, y: u8 },
}

impl ClientCommand {
    /// Wire name of the command (`method` field).
    pub fn method(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::NewGame {} => "new_game",
            Self::EnterGame { .. } => "enter_game",
            Self::ExitGame {} => "exit",
            Self::Chat { .. } => "chat",
            Self::Turn { .. } => "turn",
        }
    }

    /// Serialize the command into an outbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::Serialization`] if JSON encoding fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Inbound ─────────────────────────────────────────────────────────

/// Raw inbound envelope before the payload is interpreted.
#[derive(Debug, Clone, Deserialize)]
struct InboundEnvelope {
    message: String,
    #[serde(default)]
    payload: Value,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Login acknowledged.
    Start(StartPayload),
    /// Player is back in the lobby.
    Dashboard,
    /// Authoritative snapshot of every room.
    Rooms(HashMap<RoomId, Room>),
    /// One room was created or changed.
    RoomUpdate(Room),
    /// One room was removed.
    RoomDelete(EntityRef),
    /// Authoritative snapshot of every connected player.
    Players(HashMap<PlayerId, Player>),
    /// One player connected or changed.
    PlayerUpdate(Player),
    /// One player disconnected.
    PlayerDelete(EntityRef),
    /// This client took a seat in a game.
    GameEnter(GameEnterPayload),
    /// Both seats are taken and play begins.
    GameStart,
    /// A player left and play halted.
    GameStop,
    /// A chat line in the current game.
    GameChat(GameChatPayload),
    /// Board, score and turn owner after a move.
    GameState(GameStatePayload),
    /// The server rejected a command.
    Error(ErrorPayload),
    /// A message kind this client does not know. Ignored by the dispatcher.
    Unknown { message: String },
}

impl ServerMessage {
    /// Parse one inbound text frame.
    ///
    /// Unknown message kinds decode to [`ServerMessage::Unknown`]; they are
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ReveriError::MalformedFrame`] if the frame is not a JSON
    /// envelope or the payload does not match its message kind.
    pub fn decode(text: &str) -> Result<Self> {
        let InboundEnvelope { message, payload } =
            serde_json::from_str(text).map_err(|e| ReveriError::MalformedFrame {
                reason: format!("invalid envelope: {e}"),
            })?;

        let decoded = decode_known(&message, payload)?;
        Ok(decoded.unwrap_or(Self::Unknown { message }))
    }

    /// Wire name of the message kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::Start(_) => "start",
            Self::Dashboard => "dashboard",
            Self::Rooms(_) => "rooms",
            Self::RoomUpdate(_) => "room_update",
            Self::RoomDelete(_) => "room_delete",
            Self::Players(_) => "players",
            Self::PlayerUpdate(_) => "player_update",
            Self::PlayerDelete(_) => "player_delete",
            Self::GameEnter(_) => "game_enter",
            Self::GameStart => "game_start",
            Self::GameStop => "game_stop",
            Self::GameChat(_) => "game_chat",
            Self::GameState(_) => "game_state",
            Self::Error(_) => "error",
            Self::Unknown { message } => message,
        }
    }
}

/// Decode the payload for a known message kind, or `None` for unknown kinds.
fn decode_known(kind: &str, payload: Value) -> Result<Option<ServerMessage>> {
    let msg = match kind {
        "start" => ServerMessage::Start(payload_as(kind, payload)?),
        "dashboard" => ServerMessage::Dashboard,
        "rooms" => ServerMessage::Rooms(collection_as(kind, payload)?),
        "room_update" => ServerMessage::RoomUpdate(payload_as(kind, payload)?),
        "room_delete" => ServerMessage::RoomDelete(payload_as(kind, payload)?),
        "players" => ServerMessage::Players(collection_as(kind, payload)?),
        "player_update" => ServerMessage::PlayerUpdate(payload_as(kind, payload)?),
        "player_delete" => ServerMessage::PlayerDelete(payload_as(kind, payload)?),
        "game_enter" => ServerMessage::GameEnter(payload_as(kind, payload)?),
        "game_start" => ServerMessage::GameStart,
        "game_stop" => ServerMessage::GameStop,
        "game_chat" => ServerMessage::GameChat(payload_as(kind, payload)?),
        "game_state" => ServerMessage::GameState(payload_as(kind, payload)?),
        "error" => ServerMessage::Error(payload_as(kind, payload)?),
        _ => return Ok(None),
    };
    Ok(Some(msg))
}

fn payload_as<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| ReveriError::MalformedFrame {
        reason: format!("invalid `{kind}` payload: {e}"),
    })
}

/// Snapshot payloads map uuid → entity. An empty snapshot may arrive as
/// `null` or `{}`.
fn collection_as<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<HashMap<Uuid, T>> {
    if payload.is_null() {
        return Ok(HashMap::new());
    }
    payload_as(kind, payload)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_commands_carry_object_payload() {
        let json = ClientCommand::NewGame {}.encode().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({ "method": "new_game", "payload": {} }));

        let json = ClientCommand::ExitGame {}.encode().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({ "method": "exit", "payload": {} }));
    }

    #[test]
    fn method_matches_serialized_tag() {
        let commands = [
            ClientCommand::Login {
                username: "alice".into(),
            },
            ClientCommand::NewGame {},
            ClientCommand::EnterGame {
                game_uuid: Uuid::nil(),
            },
            ClientCommand::ExitGame {},
            ClientCommand::Chat { text: "hi".into() },
            ClientCommand::Turn { x: 2, y: 3 },
        ];
        for command in commands {
            let value: Value = serde_json::from_str(&command.encode().unwrap()).unwrap();
            assert_eq!(value["method"], command.method());
            assert!(value["payload"].is_object());
        }
    }

    #[test]
    fn unknown_kind_is_not_an_error() {
        let msg = ServerMessage::decode(r#"{"message":"leaderboard","payload":{}}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Unknown {
                message: "leaderboard".into()
            }
        );
        assert_eq!(msg.kind(), "leaderboard");
    }

    #[test]
    fn missing_payload_is_accepted_for_flag_messages() {
        let msg = ServerMessage::decode(r#"{"message":"game_start"}"#).unwrap();
        assert_eq!(msg, ServerMessage::GameStart);
    }

    #[test]
    fn not_json_is_malformed() {
        let err = ServerMessage::decode("not json").unwrap_err();
        assert!(matches!(err, ReveriError::MalformedFrame { .. }));
    }

    #[test]
    fn wrong_payload_shape_is_malformed() {
        let err =
            ServerMessage::decode(r#"{"message":"game_enter","payload":{"index":"zero"}}"#)
                .unwrap_err();
        match err {
            ReveriError::MalformedFrame { reason } => assert!(reason.contains("game_enter")),
            other => panic!("expected MalformedFrame, got {other:?}"),
        }
    }

    #[test]
    fn room_keeps_unknown_fields() {
        let id = Uuid::from_u128(7);
        let text = json!({
            "message": "room_update",
            "payload": { "uuid": id, "players": {}, "is_running": false, "title": "casual" }
        })
        .to_string();
        let ServerMessage::RoomUpdate(room) = ServerMessage::decode(&text).unwrap() else {
            panic!("expected RoomUpdate");
        };
        assert_eq!(room.uuid, id);
        assert_eq!(room.extra.get("title"), Some(&json!("casual")));
    }

    #[test]
    fn null_snapshot_is_empty() {
        let msg = ServerMessage::decode(r#"{"message":"rooms","payload":null}"#).unwrap();
        assert_eq!(msg, ServerMessage::Rooms(HashMap::new()));
    }
}
