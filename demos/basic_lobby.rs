//! # Basic Lobby Example
//!
//! Demonstrates a complete Salad Bowl client lifecycle:
//!
//! 1. Connect to a game server via WebSocket (with automatic bounded retry)
//! 2. Join the game with a display name
//! 3. React to lobby events (roster updates, phase transitions)
//! 4. Play along: submit words in the suggestion phase, watch the bowl
//! 5. Shut down gracefully on Ctrl+C or terminal connection failure
//!
//! ## Running
//!
//! ```sh
//! # Start a Salad Bowl server on localhost:8080, then:
//! cargo run --example basic_lobby
//!
//! # Override the server URL or join a specific room:
//! SALADBOWL_URL=ws://my-server:8080 SALADBOWL_ROOM=ROOM1 cargo run --example basic_lobby
//! ```

use saladbowl_client::{
    GamePhase, MemoryIdentityStore, SaladBowlClient, SaladBowlConfig, SaladBowlEvent, Team,
    WebSocketConnector,
};

/// Default server base URL when `SALADBOWL_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let base_url = std::env::var("SALADBOWL_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let room = std::env::var("SALADBOWL_ROOM").ok();
    let name = std::env::var("SALADBOWL_NAME").unwrap_or_else(|_| "RustPlayer".to_string());

    let connector = WebSocketConnector::for_game(&base_url, room.as_deref());
    tracing::info!("Connecting to {}", connector.url());

    // An in-memory store keeps the identity for this process lifetime; a
    // browser build would back this trait with sessionStorage instead.
    let store = MemoryIdentityStore::new();

    // Start the client. This spawns a background task that drives the
    // connection (including retries) and emits events on `event_rx`.
    let (mut client, mut event_rx) =
        SaladBowlClient::start(connector, store, SaladBowlConfig::new());

    // ── Event loop ──────────────────────────────────────────────────
    // Use `tokio::select!` to listen for both game events and Ctrl+C.
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the session layer.
            event = event_rx.recv() => {
                let Some(event) = event else {
                    // Channel closed — session loop exited.
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    // ── Connection lifecycle ─────────────────────────
                    SaladBowlEvent::Connected => {
                        tracing::info!("Connected, joining as {name}…");
                        client.join(name.clone())?;
                    }

                    SaladBowlEvent::Retrying { attempt, max_attempts } => {
                        tracing::warn!("Reconnecting (attempt {attempt}/{max_attempts})…");
                    }

                    SaladBowlEvent::ConnectionFailed { attempts } => {
                        tracing::error!("Gave up after {attempts} attempt(s)");
                        break;
                    }

                    SaladBowlEvent::Disconnected { reason } => {
                        tracing::warn!(
                            "Disconnected: {}",
                            reason.as_deref().unwrap_or("connection closed")
                        );
                    }

                    // ── Game lifecycle ───────────────────────────────
                    SaladBowlEvent::Welcome { player_id } => {
                        tracing::info!("Server assigned us player id {player_id}");
                        // Pick a team and signal readiness.
                        client.update_player_info(name.clone(), Team::Blue)?;
                    }

                    SaladBowlEvent::RosterUpdated { players } => {
                        tracing::info!(
                            "Roster: {}",
                            players
                                .iter()
                                .map(|p| p.name.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        );
                    }

                    SaladBowlEvent::PhaseChanged { phase } => {
                        tracing::info!("Phase → {phase:?}");
                        if phase == GamePhase::Suggestion {
                            // Throw a few words into the bowl.
                            client.suggest_words(vec![
                                "ferris".into(),
                                "borrow checker".into(),
                                "lifetime".into(),
                            ])?;
                            tracing::info!("Word suggestions sent");
                        }
                    }

                    SaladBowlEvent::WordUpdated { round } => {
                        tracing::info!(
                            "Word: {:?} ({}s left)",
                            round.word,
                            round.time_left
                        );
                    }

                    SaladBowlEvent::BowlUpdated { progress } => {
                        tracing::info!("Bowl: {}/{}", progress.current, progress.total);
                    }

                    // ── Protocol trouble (non-fatal) ─────────────────
                    SaladBowlEvent::UnknownMessage { kind } => {
                        tracing::debug!("Server sent unknown message kind {kind:?}, ignoring");
                    }

                    SaladBowlEvent::ProtocolViolation { detail } => {
                        tracing::warn!("Dropped malformed server message: {detail}");
                    }
                }
            }

            // Branch 2: Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
