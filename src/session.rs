//! Authentication, view transitions and outbound command gating.
//!
//! The view-state machine runs
//! `Login → Dashboard → Game → Dashboard → …`; the only way back to `Login`
//! is losing the connection after the server acknowledged the login.

use tracing::{debug, info};

use crate::protocol::{ClientCommand, GameEnterPayload, StartPayload};
use crate::state::{ClientState, ConnectionPhase, View};

/// What the connection loop should do after the live connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseOutcome {
    /// The connection never got past login; open a new one.
    Retry,
    /// A logged-in session was lost. Wait for an explicit reconnect.
    SessionInvalidated,
}

/// Whether an outbound command goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Send,
    Suppress,
}

/// A new connection is being opened. It carries no session yet, so the
/// login screen applies until the server acknowledges a login.
pub(crate) fn begin_connect(state: &mut ClientState) {
    state.set_phase(ConnectionPhase::Connecting);
    state.session_mut().authenticated = false;
    state.set_in_game(false);
    state.set_view(View::Login);
}

pub(crate) fn connection_opened(state: &mut ClientState) {
    state.set_phase(ConnectionPhase::Open);
}

/// Decide how to react to the end of the live connection.
pub(crate) fn connection_closed(state: &mut ClientState) -> CloseOutcome {
    state.set_phase(ConnectionPhase::Closed);
    if state.is_authenticated() {
        info!(username = %state.username(), "authenticated session lost");
        state.session_mut().authenticated = false;
        state.set_in_game(false);
        state.set_view(View::Login);
        CloseOutcome::SessionInvalidated
    } else {
        debug!("connection lost before login, retrying");
        CloseOutcome::Retry
    }
}

/// Apply the server's login acknowledgment. Returns `false` for a duplicate
/// `start`, which must not navigate again.
pub(crate) fn on_start(state: &mut ClientState, payload: StartPayload) -> bool {
    if state.is_authenticated() {
        debug!("ignoring duplicate start");
        return false;
    }
    info!(username = %payload.username, "logged in");
    let session = state.session_mut();
    session.username = payload.username;
    session.authenticated = true;
    state.set_view(View::Dashboard);
    true
}

/// Back in the lobby: leave the game view and drop the chat log.
pub(crate) fn on_dashboard(state: &mut ClientState) {
    state.set_view(View::Dashboard);
    state.set_in_game(false);
    state.game_mut().clear_chat();
}

pub(crate) fn on_game_enter(state: &mut ClientState, payload: &GameEnterPayload) {
    state.set_in_game(true);
    state.game_mut().enter(payload);
    state.set_view(View::Game);
}

/// Gate an outbound command and apply its local side effects.
///
/// - `turn` is suppressed unless the last `game_state` gave this seat the
///   turn. The server still validates every move.
/// - `exit` clears the in-game flag before the server confirms. This is the
///   one place the client changes mirrored state on its own.
pub(crate) fn prepare_command(state: &mut ClientState, command: &ClientCommand) -> Gate {
    match command {
        ClientCommand::Turn { x, y } if !state.game().order() => {
            debug!(x, y, "not our turn, dropping move");
            Gate::Suppress
        }
        ClientCommand::ExitGame {} => {
            state.set_in_game(false);
            Gate::Send
        }
        _ => Gate::Send,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GameStatePayload;
    use serde_json::json;
    use uuid::Uuid;

    fn logged_in() -> ClientState {
        let mut state = ClientState::default();
        begin_connect(&mut state);
        connection_opened(&mut state);
        on_start(
            &mut state,
            StartPayload {
                username: "alice".into(),
            },
        );
        state
    }

    #[test]
    fn start_authenticates_once() {
        let mut state = logged_in();
        assert!(state.is_authenticated());
        assert_eq!(state.username(), "alice");
        assert_eq!(state.view(), View::Dashboard);

        state.set_view(View::Game);
        let navigated = on_start(
            &mut state,
            StartPayload {
                username: "mallory".into(),
            },
        );
        assert!(!navigated);
        assert_eq!(state.username(), "alice");
        assert_eq!(state.view(), View::Game);
    }

    #[test]
    fn close_before_login_retries() {
        let mut state = ClientState::default();
        begin_connect(&mut state);
        connection_opened(&mut state);
        assert_eq!(connection_closed(&mut state), CloseOutcome::Retry);
        assert_eq!(state.view(), View::Login);
    }

    #[test]
    fn close_after_login_invalidates() {
        let mut state = logged_in();
        assert_eq!(
            connection_closed(&mut state),
            CloseOutcome::SessionInvalidated
        );
        assert!(!state.is_authenticated());
        assert_eq!(state.view(), View::Login);
        assert_eq!(state.phase(), ConnectionPhase::Closed);
    }

    #[test]
    fn new_connection_clears_authentication() {
        let mut state = logged_in();
        begin_connect(&mut state);
        assert!(!state.is_authenticated());
        assert_eq!(state.view(), View::Login);
    }

    #[test]
    fn turn_is_gated_on_order() {
        let mut state = logged_in();
        on_game_enter(
            &mut state,
            &GameEnterPayload {
                index: 0,
                game_uuid: Uuid::from_u128(1),
            },
        );
        let turn = ClientCommand::Turn { x: 2, y: 3 };
        assert_eq!(prepare_command(&mut state, &turn), Gate::Suppress);

        state.game_mut().apply_state(GameStatePayload {
            board: json!([]),
            score: [2, 2],
            order: 0,
        });
        assert_eq!(prepare_command(&mut state, &turn), Gate::Send);
    }

    #[test]
    fn exit_clears_in_game_immediately() {
        let mut state = logged_in();
        on_game_enter(
            &mut state,
            &GameEnterPayload {
                index: 1,
                game_uuid: Uuid::from_u128(1),
            },
        );
        assert!(state.in_game());
        assert_eq!(
            prepare_command(&mut state, &ClientCommand::ExitGame {}),
            Gate::Send
        );
        assert!(!state.in_game());
        // The view only changes once the server sends `dashboard`.
        assert_eq!(state.view(), View::Game);
    }
}
