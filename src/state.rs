//! Local mirror of server-authoritative state.
//!
//! [`ClientState`] is owned by the client's connection loop. Viewers receive
//! read-only snapshots through a `tokio::sync::watch` channel; every mutation
//! goes through the `pub(crate)` reconciliation operations below, driven by
//! dispatched server messages.
//!
//! Two merge disciplines apply to the lobby collections:
//!
//! - **snapshot replace** (`rooms`, `players`): the payload is the complete
//!   collection; keys missing from it are dropped.
//! - **incremental upsert/delete** (`*_update`, `*_delete`): exactly one key
//!   changes.
//!
//! Counts are recomputed from the collection size after every mutation.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

use crate::protocol::{
    GameChatPayload, GameEnterPayload, GameStatePayload, Player, PlayerId, Room, RoomId, Seat,
};

// ── Connection and view ─────────────────────────────────────────────

/// Lifecycle phase of the single live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// A connection attempt is in flight.
    #[default]
    Connecting,
    /// The connection is open and accepts commands.
    Open,
    /// No connection. Waiting for a retry or an explicit reconnect.
    Closed,
}

/// Which screen the host application should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Credentials are needed.
    #[default]
    Login,
    /// Lobby with rooms and players.
    Dashboard,
    /// Inside a game.
    Game,
}

/// Login state of the current connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub authenticated: bool,
}

// ── Lobby ───────────────────────────────────────────────────────────

/// Rooms and players currently known to the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lobby {
    rooms: HashMap<RoomId, Room>,
    games_count: usize,
    players: HashMap<PlayerId, Player>,
    players_count: usize,
}

impl Lobby {
    pub fn rooms(&self) -> &HashMap<RoomId, Room> {
        &self.rooms
    }

    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Number of rooms; always equals `rooms().len()`.
    pub fn games_count(&self) -> usize {
        self.games_count
    }

    pub fn players(&self) -> &HashMap<PlayerId, Player> {
        &self.players
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Number of connected players; always equals `players().len()`.
    pub fn players_count(&self) -> usize {
        self.players_count
    }

    pub(crate) fn replace_rooms(&mut self, rooms: HashMap<RoomId, Room>) {
        self.rooms = rooms;
        self.recount_rooms();
    }

    pub(crate) fn upsert_room(&mut self, room: Room) {
        self.rooms.insert(room.uuid, room);
        self.recount_rooms();
    }

    pub(crate) fn delete_room(&mut self, id: &RoomId) {
        self.rooms.remove(id);
        self.recount_rooms();
    }

    pub(crate) fn replace_players(&mut self, players: HashMap<PlayerId, Player>) {
        self.players = players;
        self.recount_players();
    }

    pub(crate) fn upsert_player(&mut self, player: Player) {
        self.players.insert(player.uuid, player);
        self.recount_players();
    }

    pub(crate) fn delete_player(&mut self, id: &PlayerId) {
        self.players.remove(id);
        self.recount_players();
    }

    fn recount_rooms(&mut self) {
        self.games_count = self.rooms.len();
    }

    fn recount_players(&mut self) {
        self.players_count = self.players.len();
    }
}

// ── Game ────────────────────────────────────────────────────────────

/// One chat line. `author` is `None` for server notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub author: Option<String>,
    pub text: String,
    /// 1-based arrival number; the newest entry has the highest index.
    pub index: usize,
}

/// The game this client is seated in.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    index: Option<Seat>,
    game_uuid: Option<RoomId>,
    running: bool,
    board: Value,
    score: [u32; 2],
    order: bool,
    messages: VecDeque<ChatEntry>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self {
            index: None,
            game_uuid: None,
            running: false,
            board: Value::Array(Vec::new()),
            score: [0, 0],
            order: false,
            messages: VecDeque::new(),
        }
    }
}

impl GameSession {
    /// Seat assigned by the server, once a game was entered.
    pub fn index(&self) -> Option<Seat> {
        self.index
    }

    pub fn game_uuid(&self) -> Option<RoomId> {
        self.game_uuid
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Board as last reported by the server.
    pub fn board(&self) -> &Value {
        &self.board
    }

    pub fn score(&self) -> [u32; 2] {
        self.score
    }

    /// `true` iff the last `game_state` gave the turn to this client's seat.
    pub fn order(&self) -> bool {
        self.order
    }

    /// Chat log, newest first.
    pub fn messages(&self) -> &VecDeque<ChatEntry> {
        &self.messages
    }

    /// Take a new seat. The turn is unknown until the first `game_state`
    /// of this game arrives.
    pub(crate) fn enter(&mut self, payload: &GameEnterPayload) {
        self.index = Some(payload.index);
        self.game_uuid = Some(payload.game_uuid);
        self.running = false;
        self.order = false;
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub(crate) fn push_chat(&mut self, payload: GameChatPayload) -> ChatEntry {
        let entry = ChatEntry {
            author: payload.author,
            text: payload.text,
            index: self.messages.len() + 1,
        };
        self.messages.push_front(entry.clone());
        entry
    }

    pub(crate) fn clear_chat(&mut self) {
        self.messages.clear();
    }

    pub(crate) fn apply_state(&mut self, payload: GameStatePayload) {
        self.board = payload.board;
        self.score = payload.score;
        self.order = self.index == Some(payload.order);
    }
}

// ── Whole client ────────────────────────────────────────────────────

/// Everything the client mirrors, as seen by viewers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientState {
    phase: ConnectionPhase,
    session: Session,
    view: View,
    in_game: bool,
    lobby: Lobby,
    game: GameSession,
}

impl ClientState {
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Open
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.authenticated
    }

    pub fn username(&self) -> &str {
        &self.session.username
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn in_game(&self) -> bool {
        self.in_game
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn game(&self) -> &GameSession {
        &self.game
    }

    pub(crate) fn set_phase(&mut self, phase: ConnectionPhase) {
        self.phase = phase;
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub(crate) fn set_view(&mut self, view: View) {
        self.view = view;
    }

    pub(crate) fn set_in_game(&mut self, in_game: bool) {
        self.in_game = in_game;
    }

    pub(crate) fn lobby_mut(&mut self) -> &mut Lobby {
        &mut self.lobby
    }

    pub(crate) fn game_mut(&mut self) -> &mut GameSession {
        &mut self.game
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use uuid::Uuid;

    fn room(n: u128) -> Room {
        Room {
            uuid: Uuid::from_u128(n),
            players: HashMap::new(),
            is_running: false,
            extra: Map::new(),
        }
    }

    fn player(n: u128, name: &str) -> Player {
        Player {
            uuid: Uuid::from_u128(n),
            username: name.into(),
            extra: Map::new(),
        }
    }

    fn snapshot(ids: &[u128]) -> HashMap<RoomId, Room> {
        ids.iter().map(|&n| (Uuid::from_u128(n), room(n))).collect()
    }

    #[test]
    fn snapshot_replace_drops_missing_keys() {
        let mut lobby = Lobby::default();
        lobby.replace_rooms(snapshot(&[1, 2]));
        lobby.replace_rooms(snapshot(&[2, 3]));

        let mut keys: Vec<_> = lobby.rooms().keys().copied().collect();
        keys.sort();
        assert_eq!(keys, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);
        assert_eq!(lobby.games_count(), 2);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut once = Lobby::default();
        once.upsert_player(player(1, "alice"));

        let mut twice = Lobby::default();
        twice.upsert_player(player(1, "alice"));
        twice.upsert_player(player(1, "alice"));

        assert_eq!(once, twice);
        assert_eq!(twice.players_count(), 1);
    }

    #[test]
    fn upsert_overwrites_existing_entry() {
        let mut lobby = Lobby::default();
        lobby.upsert_room(room(1));
        let mut running = room(1);
        running.is_running = true;
        lobby.upsert_room(running);

        assert!(lobby.room(&Uuid::from_u128(1)).unwrap().is_running);
        assert_eq!(lobby.games_count(), 1);
    }

    #[test]
    fn delete_of_unknown_key_keeps_count() {
        let mut lobby = Lobby::default();
        lobby.upsert_player(player(1, "alice"));
        lobby.delete_player(&Uuid::from_u128(9));
        assert_eq!(lobby.players_count(), 1);
        lobby.delete_player(&Uuid::from_u128(1));
        assert_eq!(lobby.players_count(), 0);
    }

    #[test]
    fn chat_is_newest_first_with_increasing_index() {
        let mut game = GameSession::default();
        for text in ["one", "two", "three"] {
            game.push_chat(GameChatPayload {
                author: None,
                text: text.into(),
            });
        }
        let indices: Vec<_> = game.messages().iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![3, 2, 1]);
        assert_eq!(game.messages()[0].text, "three");
    }

    #[test]
    fn order_follows_reported_seat() {
        let mut game = GameSession::default();
        game.enter(&GameEnterPayload {
            index: 1,
            game_uuid: Uuid::from_u128(5),
        });

        game.apply_state(GameStatePayload {
            board: json!([]),
            score: [2, 2],
            order: 0,
        });
        assert!(!game.order());

        game.apply_state(GameStatePayload {
            board: json!([]),
            score: [4, 1],
            order: 1,
        });
        assert!(game.order());
        assert_eq!(game.score(), [4, 1]);
    }

    #[test]
    fn entering_another_game_clears_order() {
        let mut game = GameSession::default();
        game.enter(&GameEnterPayload {
            index: 0,
            game_uuid: Uuid::from_u128(5),
        });
        game.apply_state(GameStatePayload {
            board: json!([]),
            score: [2, 2],
            order: 0,
        });
        assert!(game.order());

        game.enter(&GameEnterPayload {
            index: 1,
            game_uuid: Uuid::from_u128(6),
        });
        assert_eq!(game.index(), Some(1));
        assert!(!game.order());
    }

    #[test]
    fn order_is_false_before_entering() {
        let mut game = GameSession::default();
        game.apply_state(GameStatePayload {
            board: json!([]),
            score: [0, 0],
            order: 0,
        });
        assert!(!game.order());
    }
}
