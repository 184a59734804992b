#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Salad Bowl client integration tests.
//!
//! Provides a scripted [`MockConnector`]/[`MockTransport`] pair and helper
//! functions for constructing common server message JSON strings.

use std::collections::VecDeque;
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use saladbowl_client::protocol::{BowlPatch, GamePhase, PlayerInfo, ServerMessage, Team, WordPatch};
use saladbowl_client::transport::Connector;
use saladbowl_client::{SaladBowlError, Transport};

/// One scripted connection: the messages `recv()` will yield in order.
/// An explicit `None` entry closes the connection from the server side.
pub type Scripted = Vec<Option<Result<String, SaladBowlError>>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted transport for integration testing.
///
/// Scripted server responses are consumed in order by `recv()`; once the
/// script is exhausted the transport hangs until shutdown. All messages sent
/// by the client are recorded in the connector's shared `sent` log.
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, SaladBowlError>>>,
    sent: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), SaladBowlError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, SaladBowlError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted messages — hang forever so the session loop
            // stays alive until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), SaladBowlError> {
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// A connector that replays a script of connect outcomes.
///
/// Each entry is either `Some(script)` — the attempt succeeds and yields a
/// [`MockTransport`] playing that script — or `None`, a scripted refusal.
/// Attempts past the end of the script are refused.
pub struct MockConnector {
    outcomes: StdMutex<VecDeque<Option<Scripted>>>,
    sent: Arc<StdMutex<Vec<String>>>,
    attempts: Arc<AtomicU32>,
}

impl MockConnector {
    /// Create a connector with the given scripted connect outcomes.
    ///
    /// Returns the connector plus shared handles for inspecting sent
    /// messages and the number of connection attempts made.
    pub fn new(
        outcomes: Vec<Option<Scripted>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicU32>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let attempts = Arc::new(AtomicU32::new(0));
        let connector = Self {
            outcomes: StdMutex::new(VecDeque::from(outcomes)),
            sent: Arc::clone(&sent),
            attempts: Arc::clone(&attempts),
        };
        (connector, sent, attempts)
    }

    /// Connector whose single connection succeeds with the given script.
    pub fn single(incoming: Scripted) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicU32>) {
        Self::new(vec![Some(incoming)])
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self) -> Result<MockTransport, SaladBowlError> {
        self.attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Some(incoming)) => Ok(MockTransport {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&self.sent),
            }),
            Some(None) | None => Err(SaladBowlError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            ))),
        }
    }
}

// ── Shared identity store ───────────────────────────────────────────

use saladbowl_client::{Identity, IdentityStore, MemoryIdentityStore};

/// An [`IdentityStore`] handle that can be cloned into the client while the
/// test keeps a probe for assertions.
pub struct SharedStore(pub Arc<MemoryIdentityStore>);

impl IdentityStore for SharedStore {
    fn load(&self) -> Option<Identity> {
        self.0.load()
    }

    fn save(&self, identity: &Identity) {
        self.0.save(identity);
    }

    fn clear(&self) {
        self.0.clear();
    }
}

/// Create a store for the client plus a probe handle for the test.
pub fn shared_store() -> (SharedStore, Arc<MemoryIdentityStore>) {
    let inner = Arc::new(MemoryIdentityStore::new());
    (SharedStore(Arc::clone(&inner)), inner)
}

/// Same, but pre-seeded with an identity from a "prior session".
pub fn seeded_store(identity: Identity) -> (SharedStore, Arc<MemoryIdentityStore>) {
    let inner = Arc::new(MemoryIdentityStore::with_identity(identity));
    (SharedStore(Arc::clone(&inner)), inner)
}

// ── JSON helper functions ───────────────────────────────────────────

/// Returns the JSON string for a `ServerHello` message.
pub fn server_hello_json(player_id: u32, token: &str) -> String {
    serde_json::to_string(&ServerMessage::ServerHello {
        player_id,
        token: token.into(),
    })
    .expect("server_hello_json serialization")
}

/// Build a [`PlayerInfo`] with lobby defaults.
pub fn player(id: u32, name: &str) -> PlayerInfo {
    PlayerInfo {
        id,
        name: name.into(),
        team: None,
        is_owner: false,
        ready: false,
    }
}

/// Build a ready [`PlayerInfo`] on a team.
pub fn ready_player(id: u32, name: &str, team: Team, is_owner: bool) -> PlayerInfo {
    PlayerInfo {
        id,
        name: name.into(),
        team: Some(team),
        is_owner,
        ready: true,
    }
}

/// Returns the JSON string for a `PlayerList` message.
pub fn player_list_json(players: Vec<PlayerInfo>) -> String {
    serde_json::to_string(&ServerMessage::PlayerList { players })
        .expect("player_list_json serialization")
}

/// Returns the JSON string for a `GameStatus` message.
pub fn game_status_json(phase: GamePhase) -> String {
    serde_json::to_string(&ServerMessage::GameStatus { phase })
        .expect("game_status_json serialization")
}

/// Returns the JSON string for a `GameStatus` message with a raw phase code,
/// bypassing the typed enum (for unknown-phase scenarios).
pub fn raw_game_status_json(code: u32) -> String {
    format!(r#"{{"type":"GameStatus","data":{{"phase":{code}}}}}"#)
}

/// Returns the JSON string for a `WordNew` message.
pub fn word_new_json(patch: WordPatch) -> String {
    serde_json::to_string(&ServerMessage::WordNew(patch)).expect("word_new_json serialization")
}

/// Returns the JSON string for a `BowlUpdate` message.
pub fn bowl_update_json(patch: BowlPatch) -> String {
    serde_json::to_string(&ServerMessage::BowlUpdate(patch))
        .expect("bowl_update_json serialization")
}
