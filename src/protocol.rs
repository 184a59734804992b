//! Wire-compatible protocol types for the Salad Bowl game protocol.
//!
//! Every type in this module produces the JSON the game server speaks:
//! adjacently tagged envelopes (`{"type": "...", "data": {...}}`), camelCase
//! payload keys (`playerID`, `isOwner`, `timeLeft`), and integer phase codes.
//!
//! The codec is stateless and bidirectional: [`encode`] serializes outgoing
//! [`ClientMessage`]s, [`decode`] parses inbound text into a [`Decoded`]
//! three-way result so that unrecognized message kinds (forward compatibility)
//! are distinguishable from structurally invalid ones.

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Server-assigned player identifier, stable for the connection's lifetime.
pub type PlayerId = u32;

// ── Enums ───────────────────────────────────────────────────────────

/// Team assignment for a player in the lobby.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Blue,
    Red,
}

/// Coarse game-wide phase broadcast by the server.
///
/// The wire carries integer codes (`0` lobby, `1` suggestion, `2` playing).
/// Any other code decodes to [`GamePhase::Unknown`] — the conversion is total
/// so a server that grows new phases can never break the decode stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "u32", into = "u32")]
pub enum GamePhase {
    /// Players are gathering, picking teams, and configuring the game.
    #[default]
    Lobby,
    /// Players are submitting word suggestions for the bowl.
    Suggestion,
    /// Teams are taking turns guessing words from the bowl.
    Playing,
    /// A phase code this client version does not recognize.
    Unknown,
}

impl From<u32> for GamePhase {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Lobby,
            1 => Self::Suggestion,
            2 => Self::Playing,
            _ => Self::Unknown,
        }
    }
}

impl From<GamePhase> for u32 {
    fn from(phase: GamePhase) -> Self {
        match phase {
            GamePhase::Lobby => 0,
            GamePhase::Suggestion => 1,
            GamePhase::Playing => 2,
            // One past the last recognized phase code.
            GamePhase::Unknown => 3,
        }
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// Information about a player in the roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    /// Unset until the player has picked a team.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    #[serde(rename = "isOwner")]
    pub is_owner: bool,
    pub ready: bool,
}

/// Partial update to the current word round.
///
/// Every field is optional; the server sends only what changed and the client
/// merges into its prior state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    /// Seconds remaining in the round.
    #[serde(rename = "timeLeft", default, skip_serializing_if = "Option::is_none")]
    pub time_left: Option<u32>,
    /// Acknowledgement token to echo back in `WordSuccess`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Partial update to the guessing-bowl progress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BowlPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

/// Game configuration the room owner can adjust in the lobby.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    /// Words each player submits during the suggestion phase.
    pub max_words: u32,
    /// Length of the suggestion phase in seconds.
    pub suggestion_time: u32,
    /// Length of each guessing turn in seconds.
    pub guessing_time: u32,
    /// Number of rounds to play through the bowl.
    pub rounds: u32,
}

impl Default for GameConfig {
    /// The defaults the lobby form presents to the room owner.
    fn default() -> Self {
        Self {
            max_words: 15,
            suggestion_time: 180,
            guessing_time: 30,
            rounds: 3,
        }
    }
}

impl GameConfig {
    /// Create a configuration with the lobby defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of words each player submits.
    #[must_use]
    pub fn with_max_words(mut self, max_words: u32) -> Self {
        self.max_words = max_words;
        self
    }

    /// Set the suggestion-phase length in seconds.
    #[must_use]
    pub fn with_suggestion_time(mut self, seconds: u32) -> Self {
        self.suggestion_time = seconds;
        self
    }

    /// Set the guessing-turn length in seconds.
    #[must_use]
    pub fn with_guessing_time(mut self, seconds: u32) -> Self {
        self.guessing_time = seconds;
        self
    }

    /// Set the number of rounds.
    #[must_use]
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Join the game (or silently resume a prior session when `token` is set).
    ClientHello {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    /// Update own display name and team choice in the lobby.
    UpdatePlayerInfo { name: String, team: Team },
    /// Ask the server to start the game (room owner only).
    StartGame,
    /// Adjust the game configuration (room owner only).
    UpdateGameConfig(GameConfig),
    /// Submit word suggestions for the bowl.
    WordSuggestions { words: Vec<String> },
    /// Report the current word as guessed, echoing its acknowledgement token.
    WordSuccess { token: String },
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Handshake acknowledgement assigning this client its identity.
    ServerHello {
        #[serde(rename = "playerID")]
        player_id: PlayerId,
        token: String,
    },
    /// Full replacement of the player roster.
    PlayerList { players: Vec<PlayerInfo> },
    /// Phase transition announcement.
    GameStatus { phase: GamePhase },
    /// Partial update to the current word round.
    WordNew(WordPatch),
    /// Partial update to the guessing-bowl progress.
    BowlUpdate(BowlPatch),
}

// ── Codec ───────────────────────────────────────────────────────────

/// Message kinds this client version recognizes from the server.
const SERVER_KINDS: [&str; 5] = [
    "ServerHello",
    "PlayerList",
    "GameStatus",
    "WordNew",
    "BowlUpdate",
];

/// Result of decoding one inbound wire message.
#[derive(Debug)]
pub enum Decoded {
    /// A recognized, well-formed server message.
    Message(ServerMessage),
    /// A well-formed envelope carrying a message kind this client version does
    /// not know. Forward compatible: callers log and carry on.
    Unknown {
        /// The unrecognized `type` tag.
        kind: String,
    },
    /// Structurally invalid input (not JSON, missing envelope tag, wrong field
    /// types). The caller decides whether to drop or disconnect.
    Malformed {
        /// Human-readable description of the decode failure.
        detail: String,
    },
}

/// Decode one inbound text message into a [`Decoded`] result.
///
/// Never returns an error: malformed and unrecognized input both map to typed
/// variants so a single bad message cannot kill the receive stream.
pub fn decode(text: &str) -> Decoded {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Decoded::Malformed {
                detail: e.to_string(),
            }
        }
    };

    let Some(kind) = value.get("type").and_then(|tag| tag.as_str()) else {
        return Decoded::Malformed {
            detail: "missing or non-string \"type\" tag".to_string(),
        };
    };

    if !SERVER_KINDS.contains(&kind) {
        return Decoded::Unknown {
            kind: kind.to_string(),
        };
    }

    match serde_json::from_value::<ServerMessage>(value) {
        Ok(message) => Decoded::Message(message),
        Err(e) => Decoded::Malformed {
            detail: e.to_string(),
        },
    }
}

/// Encode an outgoing [`ClientMessage`] as a JSON text message.
///
/// # Errors
///
/// Returns [`SaladBowlError::Serialization`](crate::SaladBowlError::Serialization)
/// if the message cannot be serialized (a programming bug, not a runtime
/// condition).
pub fn encode(message: &ClientMessage) -> crate::error::Result<String> {
    Ok(serde_json::to_string(message)?)
}
