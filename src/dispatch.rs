//! Routes inbound frames to the reconciliation operations.
//!
//! Each frame is handled to completion before the next one is read. A frame
//! that fails to parse is logged and discarded; the connection stays open.

use tracing::{debug, warn};

use crate::event::ClientEvent;
use crate::protocol::ServerMessage;
use crate::session;
use crate::state::{ClientState, View};

/// Decode one raw text frame and apply it. Malformed frames yield no events.
pub(crate) fn handle_frame(state: &mut ClientState, text: &str) -> Vec<ClientEvent> {
    match ServerMessage::decode(text) {
        Ok(msg) => dispatch(state, msg),
        Err(e) => {
            warn!(len = text.len(), "discarding frame: {e}");
            debug!(raw = %text, "discarded frame contents");
            Vec::new()
        }
    }
}

/// Apply one server message to `state` and report what changed.
pub(crate) fn dispatch(state: &mut ClientState, msg: ServerMessage) -> Vec<ClientEvent> {
    debug!(kind = msg.kind(), "dispatching server message");
    match msg {
        ServerMessage::Start(payload) => {
            let username = payload.username.clone();
            if session::on_start(state, payload) {
                vec![
                    ClientEvent::Authenticated { username },
                    ClientEvent::ViewChanged {
                        view: View::Dashboard,
                    },
                ]
            } else {
                Vec::new()
            }
        }
        ServerMessage::Dashboard => {
            session::on_dashboard(state);
            vec![ClientEvent::ViewChanged {
                view: View::Dashboard,
            }]
        }
        ServerMessage::Rooms(rooms) => {
            state.lobby_mut().replace_rooms(rooms);
            vec![lobby_updated(state)]
        }
        ServerMessage::RoomUpdate(room) => {
            state.lobby_mut().upsert_room(room);
            vec![lobby_updated(state)]
        }
        ServerMessage::RoomDelete(room) => {
            state.lobby_mut().delete_room(&room.uuid);
            vec![lobby_updated(state)]
        }
        ServerMessage::Players(players) => {
            state.lobby_mut().replace_players(players);
            vec![lobby_updated(state)]
        }
        ServerMessage::PlayerUpdate(player) => {
            state.lobby_mut().upsert_player(player);
            vec![lobby_updated(state)]
        }
        ServerMessage::PlayerDelete(player) => {
            state.lobby_mut().delete_player(&player.uuid);
            vec![lobby_updated(state)]
        }
        ServerMessage::GameEnter(payload) => {
            session::on_game_enter(state, &payload);
            vec![
                ClientEvent::GameEntered {
                    index: payload.index,
                    game_uuid: payload.game_uuid,
                },
                ClientEvent::ViewChanged { view: View::Game },
            ]
        }
        ServerMessage::GameStart => {
            state.game_mut().set_running(true);
            vec![ClientEvent::GameStarted]
        }
        ServerMessage::GameStop => {
            state.game_mut().set_running(false);
            vec![ClientEvent::GameStopped]
        }
        ServerMessage::GameChat(payload) => {
            let entry = state.game_mut().push_chat(payload);
            vec![ClientEvent::ChatReceived(entry)]
        }
        ServerMessage::GameState(payload) => {
            state.game_mut().apply_state(payload);
            let game = state.game();
            vec![ClientEvent::GameStateUpdated {
                score: game.score(),
                order: game.order(),
            }]
        }
        ServerMessage::Error(payload) => {
            warn!(kind = %payload.kind, args = %payload.args, "server reported an error");
            vec![ClientEvent::ServerError {
                kind: payload.kind,
                args: payload.args,
            }]
        }
        ServerMessage::Unknown { message } => {
            debug!(kind = %message, "ignoring unknown message kind");
            Vec::new()
        }
    }
}

fn lobby_updated(state: &ClientState) -> ClientEvent {
    let lobby = state.lobby();
    ClientEvent::LobbyUpdated {
        games_count: lobby.games_count(),
        players_count: lobby.players_count(),
    }
}
