//! Client-local session state.
//!
//! [`SessionState`] is the single owned view of everything the UI renders:
//! identity, roster, game phase, and the phase-scoped ephemeral data. All
//! mutation funnels through [`SessionState::apply`], one synchronous
//! run-to-completion step per inbound [`ServerMessage`], so the state machine
//! stays centrally auditable. No I/O happens here — the session loop in
//! [`client`](crate::client) owns the transport and calls in.

use crate::protocol::{GamePhase, PlayerId, PlayerInfo, ServerMessage};

// ── Identity ────────────────────────────────────────────────────────

/// Durable identity for one game session.
///
/// Created empty, populated by the server's `ServerHello`, persisted through
/// an [`IdentityStore`](crate::store::IdentityStore) immediately on token
/// assignment, and retained across reconnects within the same session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Server-assigned player id, stable for the connection's lifetime.
    pub player_id: Option<PlayerId>,
    /// Opaque session token used to resume after a reconnect or page reload.
    pub token: Option<String>,
    /// Display name last used to greet the server.
    pub display_name: Option<String>,
}

impl Identity {
    /// Whether this identity carries enough to attempt a silent resume.
    ///
    /// A display name is the only hard requirement — the handshake works
    /// without a token, it just registers a fresh player.
    pub fn is_resumable(&self) -> bool {
        self.display_name.is_some()
    }
}

// ── Roster ──────────────────────────────────────────────────────────

/// The full set of currently known players, ordered by arrival.
///
/// Rebuilt atomically on every `PlayerList` message — the server's last
/// announced set is the whole truth, there is no client-side merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    players: Vec<PlayerInfo>,
}

impl Roster {
    /// Replace the entire roster with the server's latest announcement.
    ///
    /// Ids are unique keys: should the server ever repeat one, the later
    /// entry wins while keeping the earlier arrival position.
    pub fn replace_all(&mut self, players: Vec<PlayerInfo>) {
        self.players.clear();
        for player in players {
            if let Some(existing) = self.players.iter_mut().find(|p| p.id == player.id) {
                *existing = player;
            } else {
                self.players.push(player);
            }
        }
    }

    /// Look up a player by id.
    pub fn get(&self, id: PlayerId) -> Option<&PlayerInfo> {
        self.players.iter().find(|p| p.id == id)
    }

    /// All players in arrival order.
    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    /// Number of known players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Forget all players.
    pub fn clear(&mut self) {
        self.players.clear();
    }
}

// ── Ephemeral phase data ────────────────────────────────────────────

/// State of the current word round, meaningful during the suggestion and
/// playing phases. Merged field-by-field from partial `WordNew` updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordRound {
    /// The word currently in play.
    pub word: String,
    /// Seconds remaining in the round.
    pub time_left: u32,
    /// Acknowledgement token to echo back in `WordSuccess`.
    pub token: String,
}

impl WordRound {
    /// Merge a partial update; unspecified fields keep their prior values.
    pub fn merge(&mut self, patch: &crate::protocol::WordPatch) {
        if let Some(word) = &patch.word {
            self.word = word.clone();
        }
        if let Some(time_left) = patch.time_left {
            self.time_left = time_left;
        }
        if let Some(token) = &patch.token {
            self.token = token.clone();
        }
    }
}

/// Progress through the guessing bowl, meaningful during the playing phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BowlProgress {
    /// Index of the word currently in play.
    pub current: u32,
    /// Total number of words in the bowl.
    pub total: u32,
}

impl BowlProgress {
    /// Merge a partial update; unspecified fields keep their prior values.
    pub fn merge(&mut self, patch: &crate::protocol::BowlPatch) {
        if let Some(current) = patch.current {
            self.current = current;
        }
        if let Some(total) = patch.total {
            self.total = total;
        }
    }
}

// ── Apply outcome ───────────────────────────────────────────────────

/// What one [`SessionState::apply`] step did, so the caller can pick the
/// matching event to emit and decide whether to persist the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Identity assigned. `changed` is false for an idempotent duplicate
    /// `ServerHello` carrying the values already held.
    Hello { changed: bool },
    /// Roster replaced wholesale.
    Roster,
    /// Phase set. `changed` is false when the server re-announced the phase
    /// already active (ephemeral state is left untouched in that case).
    Phase { changed: bool },
    /// Word round merged.
    Word,
    /// Bowl progress merged.
    Bowl,
}

// ── Session state ───────────────────────────────────────────────────

/// The authoritative client-local view of one game session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Own identity; survives reconnects.
    pub identity: Identity,
    /// Full player roster; reset on disconnect.
    pub roster: Roster,
    /// Current game phase; reset on disconnect.
    pub phase: GamePhase,
    /// Current word round; reset on disconnect and phase change.
    pub word_round: WordRound,
    /// Guessing-bowl progress; reset on disconnect and phase change.
    pub bowl_progress: BowlProgress,
    /// Most recent non-fatal failure (decode errors and the like), for the
    /// UI to surface. Never cleared by inbound traffic.
    pub last_error: Option<String>,
}

impl SessionState {
    /// Apply one inbound server message.
    ///
    /// Run-to-completion: by the time this returns, the state is fully
    /// consistent with the message — no partial mutation is ever visible.
    pub fn apply(&mut self, message: &ServerMessage) -> Applied {
        match message {
            ServerMessage::ServerHello { player_id, token } => {
                let changed = self.identity.player_id != Some(*player_id)
                    || self.identity.token.as_deref() != Some(token.as_str());
                if changed {
                    self.identity.player_id = Some(*player_id);
                    self.identity.token = Some(token.clone());
                }
                Applied::Hello { changed }
            }
            ServerMessage::PlayerList { players } => {
                self.roster.replace_all(players.clone());
                Applied::Roster
            }
            ServerMessage::GameStatus { phase } => {
                let changed = *phase != self.phase;
                if changed {
                    // Clear round data from the outgoing phase before any
                    // event of the new phase can be processed.
                    self.word_round = WordRound::default();
                    self.bowl_progress = BowlProgress::default();
                    self.phase = *phase;
                }
                Applied::Phase { changed }
            }
            // Merged in whatever phase they arrive: the server is
            // authoritative, and phase-change clearing above already
            // guarantees no stale carry-over between rounds.
            ServerMessage::WordNew(patch) => {
                self.word_round.merge(patch);
                Applied::Word
            }
            ServerMessage::BowlUpdate(patch) => {
                self.bowl_progress.merge(patch);
                Applied::Bowl
            }
        }
    }

    /// Reset everything that must not outlive a connection.
    ///
    /// Called on any transition away from connected; identity is retained so
    /// the next connection can resume the same session.
    pub fn reset_transient(&mut self) {
        self.roster.clear();
        self.phase = GamePhase::default();
        self.word_round = WordRound::default();
        self.bowl_progress = BowlProgress::default();
    }

    /// Record a non-fatal failure for the UI to observe.
    pub fn record_error(&mut self, detail: impl Into<String>) {
        self.last_error = Some(detail.into());
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{BowlPatch, Team, WordPatch};

    fn player(id: PlayerId, name: &str) -> PlayerInfo {
        PlayerInfo {
            id,
            name: name.into(),
            team: None,
            is_owner: false,
            ready: false,
        }
    }

    fn hello(player_id: PlayerId, token: &str) -> ServerMessage {
        ServerMessage::ServerHello {
            player_id,
            token: token.into(),
        }
    }

    #[test]
    fn initial_state_is_lobby_with_empty_identity() {
        let state = SessionState::default();
        assert_eq!(state.phase, GamePhase::Lobby);
        assert_eq!(state.identity, Identity::default());
        assert!(state.roster.is_empty());
    }

    #[test]
    fn server_hello_assigns_identity() {
        let mut state = SessionState::default();
        let applied = state.apply(&hello(7, "t1"));
        assert_eq!(applied, Applied::Hello { changed: true });
        assert_eq!(state.identity.player_id, Some(7));
        assert_eq!(state.identity.token.as_deref(), Some("t1"));
    }

    #[test]
    fn duplicate_server_hello_is_a_noop() {
        let mut state = SessionState::default();
        state.apply(&hello(7, "t1"));
        let applied = state.apply(&hello(7, "t1"));
        assert_eq!(applied, Applied::Hello { changed: false });
    }

    #[test]
    fn server_hello_with_new_values_replaces_identity() {
        let mut state = SessionState::default();
        state.apply(&hello(7, "t1"));
        let applied = state.apply(&hello(9, "t2"));
        assert_eq!(applied, Applied::Hello { changed: true });
        assert_eq!(state.identity.player_id, Some(9));
        assert_eq!(state.identity.token.as_deref(), Some("t2"));
    }

    #[test]
    fn player_list_replaces_roster_wholesale() {
        let mut state = SessionState::default();
        state.apply(&ServerMessage::PlayerList {
            players: vec![player(1, "Alice"), player(2, "Bob")],
        });
        assert_eq!(state.roster.len(), 2);

        // A later list fully supersedes the earlier one — Bob is gone.
        state.apply(&ServerMessage::PlayerList {
            players: vec![player(1, "Alice"), player(3, "Carol")],
        });
        assert_eq!(state.roster.len(), 2);
        assert!(state.roster.get(2).is_none());
        assert_eq!(state.roster.get(3).unwrap().name, "Carol");
    }

    #[test]
    fn roster_keeps_arrival_order() {
        let mut roster = Roster::default();
        roster.replace_all(vec![player(3, "c"), player(1, "a"), player(2, "b")]);
        let ids: Vec<PlayerId> = roster.players().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn roster_deduplicates_repeated_ids_last_wins() {
        let mut roster = Roster::default();
        roster.replace_all(vec![player(1, "old"), player(2, "b"), player(1, "new")]);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get(1).unwrap().name, "new");
        let ids: Vec<PlayerId> = roster.players().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn unknown_phase_code_maps_to_unknown() {
        let mut state = SessionState::default();
        let applied = state.apply(&ServerMessage::GameStatus {
            phase: GamePhase::from(42),
        });
        assert_eq!(applied, Applied::Phase { changed: true });
        assert_eq!(state.phase, GamePhase::Unknown);
    }

    #[test]
    fn phase_change_clears_ephemeral_state() {
        let mut state = SessionState::default();
        state.apply(&ServerMessage::WordNew(WordPatch {
            word: Some("apple".into()),
            time_left: Some(30),
            token: Some("ack".into()),
        }));
        state.apply(&ServerMessage::BowlUpdate(BowlPatch {
            current: Some(3),
            total: Some(10),
        }));

        state.apply(&ServerMessage::GameStatus {
            phase: GamePhase::Playing,
        });

        assert_eq!(state.word_round, WordRound::default());
        assert_eq!(state.bowl_progress, BowlProgress::default());
    }

    #[test]
    fn reannounced_phase_keeps_ephemeral_state() {
        let mut state = SessionState::default();
        state.apply(&ServerMessage::GameStatus {
            phase: GamePhase::Playing,
        });
        state.apply(&ServerMessage::BowlUpdate(BowlPatch {
            current: Some(3),
            total: Some(10),
        }));

        let applied = state.apply(&ServerMessage::GameStatus {
            phase: GamePhase::Playing,
        });
        assert_eq!(applied, Applied::Phase { changed: false });
        assert_eq!(state.bowl_progress.current, 3);
    }

    #[test]
    fn word_patches_merge_field_by_field() {
        let mut state = SessionState::default();
        state.apply(&ServerMessage::WordNew(WordPatch {
            time_left: Some(12),
            ..WordPatch::default()
        }));
        state.apply(&ServerMessage::WordNew(WordPatch {
            word: Some("apple".into()),
            ..WordPatch::default()
        }));

        assert_eq!(state.word_round.word, "apple");
        assert_eq!(state.word_round.time_left, 12);
        assert_eq!(state.word_round.token, "");
    }

    #[test]
    fn bowl_patches_merge_field_by_field() {
        let mut state = SessionState::default();
        state.apply(&ServerMessage::BowlUpdate(BowlPatch {
            total: Some(20),
            ..BowlPatch::default()
        }));
        state.apply(&ServerMessage::BowlUpdate(BowlPatch {
            current: Some(4),
            ..BowlPatch::default()
        }));

        assert_eq!(state.bowl_progress.current, 4);
        assert_eq!(state.bowl_progress.total, 20);
    }

    #[test]
    fn reset_transient_keeps_identity() {
        let mut state = SessionState::default();
        state.identity.display_name = Some("Alice".into());
        state.apply(&hello(7, "t1"));
        state.apply(&ServerMessage::PlayerList {
            players: vec![player(7, "Alice")],
        });
        state.apply(&ServerMessage::GameStatus {
            phase: GamePhase::Playing,
        });
        state.apply(&ServerMessage::BowlUpdate(BowlPatch {
            current: Some(3),
            total: Some(10),
        }));

        state.reset_transient();

        assert!(state.roster.is_empty());
        assert_eq!(state.phase, GamePhase::Lobby);
        assert_eq!(state.bowl_progress, BowlProgress::default());
        assert_eq!(state.word_round, WordRound::default());
        // Identity survives so the next connection can resume silently.
        assert_eq!(state.identity.player_id, Some(7));
        assert_eq!(state.identity.token.as_deref(), Some("t1"));
        assert_eq!(state.identity.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn record_error_retains_prior_state() {
        let mut state = SessionState::default();
        state.apply(&ServerMessage::PlayerList {
            players: vec![player(1, "Alice")],
        });
        state.record_error("bad frame");
        assert_eq!(state.last_error.as_deref(), Some("bad frame"));
        assert_eq!(state.roster.len(), 1);
    }

    #[test]
    fn team_assignment_round_trips_through_roster() {
        let mut state = SessionState::default();
        let mut p = player(1, "Alice");
        p.team = Some(Team::Red);
        state.apply(&ServerMessage::PlayerList { players: vec![p] });
        assert_eq!(state.roster.get(1).unwrap().team, Some(Team::Red));
    }
}
