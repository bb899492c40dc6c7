//! # Console Lobby Example
//!
//! Demonstrates a complete Reveri client lifecycle:
//!
//! 1. Connect to a Reveri server via WebSocket
//! 2. Log in with a display name
//! 3. Join an open game from the lobby, or create one
//! 4. Play by trying empty cells in board order until the server accepts one
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a Reveri server on localhost:8081, then:
//! cargo run --example console_lobby
//!
//! # Override the server URL and name:
//! REVERI_URL=ws://my-server:8081 REVERI_USERNAME=bob cargo run --example console_lobby
//! ```

use reveri_client::error_codes::ServerErrorKind;
use reveri_client::protocol::RoomId;
use reveri_client::state::ClientState;
use reveri_client::{ClientConfig, ClientEvent, ReveriClient, View, WebSocketConnector};

/// Default server URL when `REVERI_URL` is not set.
const DEFAULT_URL: &str = "ws://127.0.0.1:8081";

/// Default display name when `REVERI_USERNAME` is not set.
const DEFAULT_USERNAME: &str = "rustacean";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=reveri_client=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("REVERI_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let username =
        std::env::var("REVERI_USERNAME").unwrap_or_else(|_| DEFAULT_USERNAME.to_string());
    tracing::info!("Connecting to {url}");

    // The client opens the connection itself and retries until login.
    let connector = WebSocketConnector::new(url);
    let (mut client, mut event_rx) = ReveriClient::start(connector, ClientConfig::new());

    // Cells we still believe are free, tried in order on our turn.
    let mut candidates: Vec<(u8, u8)> = Vec::new();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    ClientEvent::Connected => {
                        tracing::info!("Connected, logging in as {username}");
                        client.login(username.clone())?;
                    }

                    ClientEvent::Authenticated { username } => {
                        tracing::info!("Logged in as {username}");
                    }

                    ClientEvent::ViewChanged { view: View::Dashboard } => {
                        let open_game = find_open_game(&client.state().borrow());
                        match open_game {
                            Some(game_uuid) => {
                                tracing::info!("Joining game {game_uuid}");
                                client.enter_game(game_uuid)?;
                            }
                            None => {
                                tracing::info!("No open games, creating one");
                                client.new_game()?;
                            }
                        }
                    }

                    ClientEvent::ViewChanged { view } => {
                        tracing::info!("View: {view:?}");
                    }

                    ClientEvent::LobbyUpdated { games_count, players_count } => {
                        tracing::info!("Lobby: {games_count} game(s), {players_count} player(s)");
                    }

                    ClientEvent::GameEntered { index, game_uuid } => {
                        tracing::info!("Took seat {index} in game {game_uuid}");
                    }

                    ClientEvent::GameStarted => {
                        tracing::info!("Game started");
                        client.chat("good luck!")?;
                    }

                    ClientEvent::GameStopped => {
                        tracing::info!("Opponent left, leaving the game");
                        client.exit_game()?;
                    }

                    ClientEvent::ChatReceived(entry) => {
                        let author = entry.author.as_deref().unwrap_or("server");
                        tracing::info!("[{author}] {}", entry.text);
                    }

                    ClientEvent::GameStateUpdated { score, order } => {
                        let [first, second] = score;
                        tracing::info!("Score {first} : {second}");
                        if order {
                            candidates = empty_cells(&client.state().borrow());
                            play_next(&client, &mut candidates)?;
                        }
                    }

                    ClientEvent::ServerError { kind: ServerErrorKind::InvalidTurn, .. } => {
                        // That cell was not a legal move; try the next one.
                        play_next(&client, &mut candidates)?;
                    }

                    ClientEvent::ServerError { kind, args } => {
                        tracing::warn!("Server error: {kind} {args}");
                    }

                    ClientEvent::SessionInvalidated => {
                        tracing::warn!("Session lost, reconnecting");
                        client.reconnect()?;
                    }

                    ClientEvent::Reconnecting { attempt, delay } => {
                        tracing::info!("Reconnect attempt {attempt} in {delay:?}");
                    }

                    ClientEvent::Disconnected { reason } => {
                        tracing::info!(
                            "Disconnected: {}",
                            reason.as_deref().unwrap_or("unknown reason")
                        );
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    client.shutdown().await;
    tracing::info!("Client shut down");
    Ok(())
}

/// A game with a free seat that has not started.
fn find_open_game(state: &ClientState) -> Option<RoomId> {
    state
        .lobby()
        .rooms()
        .values()
        .find(|room| !room.is_running && room.players.len() < 2)
        .map(|room| room.uuid)
}

/// Empty cells from the board as the server reports it: a list of lines,
/// each with `values` of `{x, y, value}` where `-1` marks an empty cell.
fn empty_cells(state: &ClientState) -> Vec<(u8, u8)> {
    let Some(lines) = state.game().board().as_array() else {
        return Vec::new();
    };
    let cells = lines
        .iter()
        .filter_map(|line| line.get("values")?.as_array())
        .flatten();
    let mut empty: Vec<(u8, u8)> = cells
        .filter(|cell| cell.get("value").and_then(|v| v.as_i64()) == Some(-1))
        .filter_map(|cell| {
            let x = u8::try_from(cell.get("x")?.as_u64()?).ok()?;
            let y = u8::try_from(cell.get("y")?.as_u64()?).ok()?;
            Some((x, y))
        })
        .collect();
    // Pop from the end, so reverse to try cells in board order.
    empty.reverse();
    empty
}

fn play_next(
    client: &ReveriClient,
    candidates: &mut Vec<(u8, u8)>,
) -> Result<(), reveri_client::ReveriError> {
    match candidates.pop() {
        Some((x, y)) => {
            tracing::info!("Playing ({x}, {y})");
            client.turn(x, y)
        }
        None => {
            tracing::warn!("No legal move left to try");
            Ok(())
        }
    }
}
