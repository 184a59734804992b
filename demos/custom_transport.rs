//! # Custom Transport Example
//!
//! Shows how to implement the [`Transport`] and [`Connector`] traits with a
//! simple in-process loopback channel. This is useful for:
//!
//! - **Testing** — drive the full session layer without a real server
//! - **Custom backends** — adapt any I/O layer (TCP, QUIC, WebRTC data channels)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use saladbowl_client::transport::Connector;
use saladbowl_client::{
    MemoryIdentityStore, SaladBowlClient, SaladBowlConfig, SaladBowlError, SaladBowlEvent,
    Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// A loopback transport that shuttles messages through in-process channels.
///
/// This transport consists of two halves:
/// - The **client half** (`LoopbackTransport`) implements [`Transport`] and is
///   produced by the [`LoopbackConnector`].
/// - The **server half** (`LoopbackServer`) lets you inject responses and read
///   what the client sent — perfect for testing.
pub struct LoopbackTransport {
    /// Messages the client sends go here (server reads from the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Messages the server sends arrive here (client reads them).
    rx: mpsc::UnboundedReceiver<String>,
}

/// The "server side" of the loopback — use this to drive the conversation.
pub struct LoopbackServer {
    /// Read what the client sent.
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Send messages to the client (as if they came from a server).
    pub tx: mpsc::UnboundedSender<String>,
}

/// Create a connected `(transport, server)` pair.
fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    // Client → Server channel
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    // Server → Client channel
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    let transport = LoopbackTransport {
        tx: client_tx,
        rx: client_rx,
    };
    let server = LoopbackServer {
        rx: server_rx,
        tx: server_tx,
    };

    (transport, server)
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the Transport trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    /// Send a JSON message to the "server" side of the loopback.
    async fn send(&mut self, message: String) -> Result<(), SaladBowlError> {
        self.tx
            .send(message)
            .map_err(|e| SaladBowlError::TransportSend(e.to_string()))
    }

    /// Receive the next message from the "server" side.
    ///
    /// Returns `None` when the server channel is closed — this is how the
    /// client discovers that the connection has ended.
    ///
    /// This method is **cancel-safe** because `mpsc::UnboundedReceiver::recv`
    /// is cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, SaladBowlError>> {
        self.rx.recv().await.map(Ok)
    }

    /// Close is a no-op for channels — dropping is sufficient.
    async fn close(&mut self) -> Result<(), SaladBowlError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Implement the Connector trait
// ─────────────────────────────────────────────────────────────────────

/// Hands out one pre-built loopback transport; a real connector would dial
/// a fresh connection each time the session loop retries.
struct LoopbackConnector {
    transport: Mutex<Option<LoopbackTransport>>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self) -> Result<LoopbackTransport, SaladBowlError> {
        self.transport
            .lock()
            .map_err(|_| SaladBowlError::TransportClosed)?
            .take()
            .ok_or(SaladBowlError::TransportClosed)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 4: Wire together the client and the fake server
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Create the loopback pair.
    let (transport, mut server) = loopback_pair();
    let connector = LoopbackConnector {
        transport: Mutex::new(Some(transport)),
    };

    // Start the client and join the game.
    let (mut client, mut event_rx) = SaladBowlClient::start(
        connector,
        MemoryIdentityStore::new(),
        SaladBowlConfig::new(),
    );
    client.join("Ferris")?;

    // ── Fake server: read the hello and respond ─────────────────────
    let Some(hello_msg) = server.rx.recv().await else {
        return Err("server channel closed before ClientHello was received".into());
    };
    tracing::info!("Server received: {hello_msg}");

    // Respond with a synthetic handshake acknowledgement (the JSON must match
    // the wire format — adjacently tagged: {"type": "Variant", "data": {…}}).
    let hello_response = serde_json::json!({
        "type": "ServerHello",
        "data": {
            "playerID": 1,
            "token": "loopback-token"
        }
    });
    server.tx.send(hello_response.to_string())?;

    // And a one-player roster.
    let roster = serde_json::json!({
        "type": "PlayerList",
        "data": {
            "players": [
                { "id": 1, "name": "Ferris", "isOwner": true, "ready": false }
            ]
        }
    });
    server.tx.send(roster.to_string())?;

    // ── Read events from the client ─────────────────────────────────
    // We expect Connected (synthetic), then Welcome, then RosterUpdated.
    let mut events_seen = 0;
    while let Some(event) = event_rx.recv().await {
        match &event {
            SaladBowlEvent::Connected => {
                tracing::info!("Event: Connected (synthetic)");
            }
            SaladBowlEvent::Welcome { player_id } => {
                tracing::info!("Event: Welcome — player_id={player_id}");
            }
            SaladBowlEvent::RosterUpdated { players } => {
                tracing::info!("Event: RosterUpdated — {} player(s)", players.len());
            }
            SaladBowlEvent::Disconnected { reason } => {
                tracing::info!(
                    "Event: Disconnected — {}",
                    reason.as_deref().unwrap_or("clean")
                );
                break;
            }
            other => {
                tracing::info!("Event: {other:?}");
            }
        }

        events_seen += 1;
        // After seeing the handshake and roster, shut down.
        if events_seen >= 3 {
            break;
        }
    }

    // ── Clean shutdown ──────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Done — saw {events_seen} event(s). Custom transport works!");
    Ok(())
}
