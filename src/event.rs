//! Events emitted to the consumer of a [`SaladBowlClient`](crate::SaladBowlClient).
//!
//! One variant per applied server message plus synthetic connection-lifecycle
//! events originating in the session loop itself. Gameplay variants carry a
//! snapshot of the post-apply state so a UI can render straight from the
//! event without re-locking the session state.

use crate::protocol::{GamePhase, PlayerId, PlayerInfo};
use crate::session::{BowlProgress, WordRound};

/// Events delivered on the channel returned by
/// [`SaladBowlClient::start`](crate::SaladBowlClient::start).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaladBowlEvent {
    // ── Synthetic: connection lifecycle ─────────────────────────────

    /// The transport connected. Emitted for the first connection and for
    /// every successful reconnect.
    Connected,

    /// A connection attempt failed; the client is waiting out the backoff
    /// before attempt `attempt` of `max_attempts`.
    Retrying {
        /// The upcoming attempt number (1-based).
        attempt: u32,
        /// The configured attempt bound.
        max_attempts: u32,
    },

    /// Every configured attempt failed. Terminal until
    /// [`reconnect_now`](crate::SaladBowlClient::reconnect_now) is called.
    ConnectionFailed {
        /// Number of attempts that were made.
        attempts: u32,
    },

    /// The connection dropped (or the client shut down). Transient session
    /// state has been reset; identity is retained.
    Disconnected {
        /// Human-readable cause, when one is known.
        reason: Option<String>,
    },

    // ── Applied server messages ─────────────────────────────────────

    /// The server acknowledged the handshake and assigned an identity.
    Welcome {
        /// The server-assigned player id.
        player_id: PlayerId,
    },

    /// The roster was replaced wholesale.
    RosterUpdated {
        /// The complete new roster, in arrival order.
        players: Vec<PlayerInfo>,
    },

    /// The game moved to a new phase. Ephemeral round state has been cleared.
    PhaseChanged {
        /// The phase now active.
        phase: GamePhase,
    },

    /// The current word round changed.
    WordUpdated {
        /// Snapshot of the merged word round.
        round: WordRound,
    },

    /// The guessing-bowl progress changed.
    BowlUpdated {
        /// Snapshot of the merged progress.
        progress: BowlProgress,
    },

    // ── Non-fatal protocol trouble ──────────────────────────────────

    /// The server sent a message kind this client version does not know.
    /// Informational; state is unchanged.
    UnknownMessage {
        /// The unrecognized `type` tag.
        kind: String,
    },

    /// The server sent a structurally invalid message. It was dropped and
    /// prior state retained.
    ProtocolViolation {
        /// Description of the decode failure.
        detail: String,
    },
}
