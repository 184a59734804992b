//! Async client for the Salad Bowl game protocol.
//!
//! [`SaladBowlClient`] is a thin handle that communicates with a background
//! session loop task via an unbounded MPSC channel. Events are emitted on a
//! bounded channel ([`tokio::sync::mpsc::Receiver<SaladBowlEvent>`]) returned
//! from [`SaladBowlClient::start`], and connection state is published on a
//! `tokio::sync::watch` channel.
//!
//! The session loop owns the whole connection lifecycle: it dials through the
//! supplied [`Connector`], retries failed attempts up to a configured bound
//! with doubling backoff, greets the server with a persisted identity for
//! silent resume, applies inbound events to the [`SessionState`], and resets
//! transient state whenever the connection is lost.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("ws://localhost:8080/ws/ROOM1");
//! let store = MemoryIdentityStore::new();
//! let (client, mut events) = SaladBowlClient::start(connector, store, SaladBowlConfig::new());
//!
//! client.join("Alice")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SaladBowlEvent::PhaseChanged { phase, .. } => { /* … */ }
//!         SaladBowlEvent::ConnectionFailed { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, warn};

use crate::error::{Result, SaladBowlError};
use crate::event::SaladBowlEvent;
use crate::protocol::{self, ClientMessage, Decoded, GameConfig, GamePhase, PlayerInfo, Team};
use crate::session::{Applied, BowlProgress, Identity, SessionState, WordRound};
use crate::store::IdentityStore;
use crate::transport::{ConnectionState, Connector, Transport};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default connection attempt bound.
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay between attempts; doubles per subsequent attempt.
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`SaladBowlClient`] session.
///
/// All fields have sensible defaults.
///
/// # Example
///
/// ```
/// use saladbowl_client::client::SaladBowlConfig;
/// use std::time::Duration;
///
/// let config = SaladBowlConfig::new()
///     .with_retry_attempts(5)
///     .with_retry_base_delay(Duration::from_millis(250));
/// assert_eq!(config.retry_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct SaladBowlConfig {
    /// Connection attempts per cycle before the session parks in the failed
    /// state. Defaults to **3**; values below 1 are clamped to 1.
    pub retry_attempts: u32,
    /// Delay before the second attempt of a cycle; doubles per attempt after
    /// that. Defaults to **1 second**.
    pub retry_base_delay: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming server messages, events
    /// are dropped (with a warning logged) to avoid blocking the session
    /// loop. The `Disconnected` event is always delivered regardless of
    /// capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`SaladBowlClient::shutdown`] is called, the background session
    /// loop is given this much time to close the transport and emit a final
    /// `Disconnected` event. If the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl SaladBowlConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the connection attempt bound. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Set the base backoff delay between connection attempts.
    #[must_use]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for SaladBowlConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// Messages from the handle to the session loop.
enum Command {
    /// Serialize and send an intent.
    ///
    /// While the loop is reconnecting, commands simply queue on the channel
    /// and flush in order once a transport is live again (buffer-and-flush
    /// policy; nothing is silently lost while retrying).
    Send(ClientMessage),
    /// Start a fresh connection cycle from the terminal failed state.
    Reconnect,
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the Salad Bowl game protocol.
///
/// Created via [`SaladBowlClient::start`], which spawns a background session
/// loop and returns this handle together with an event receiver.
///
/// All intent methods serialize a [`ClientMessage`] and queue it to the
/// session loop. They return immediately once the message is queued (no
/// round-trip await); acknowledgements, if any, arrive later as ordinary
/// [`SaladBowlEvent`]s.
pub struct SaladBowlClient {
    /// Sender half of the command channel to the session loop.
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Shared session state updated by the loop.
    state: Arc<Mutex<SessionState>>,
    /// Connection state published by the loop.
    conn_rx: watch::Receiver<ConnectionState>,
    /// Handle to the background session loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the session loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl SaladBowlClient {
    /// Start the session loop and return a handle plus event receiver.
    ///
    /// The loop immediately dials through `connector`. If `store` holds a
    /// persisted identity with a display name, the first outgoing message on
    /// every fresh connection is an automatic `ClientHello` carrying it — a
    /// silent resume with no UI interaction.
    ///
    /// # Arguments
    ///
    /// * `connector` — Dials one connection attempt per call; the loop owns
    ///   the retry policy around it.
    /// * `store` — Durable identity storage, read at connect time and written
    ///   on token assignment.
    /// * `config` — Session configuration.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, event_receiver)`. The event receiver
    /// yields [`SaladBowlEvent`]s until the session loop exits.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start<C, S>(
        connector: C,
        store: S,
        config: SaladBowlConfig,
    ) -> (Self, mpsc::Receiver<SaladBowlEvent>)
    where
        C: Connector,
        S: IdentityStore,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<SaladBowlEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let (conn_tx, conn_rx) = watch::channel(ConnectionState::Connecting);

        // Seed the session state from the store so accessors (and the first
        // connection's resume handshake) see the persisted identity.
        let mut initial = SessionState::default();
        if let Some(identity) = store.load() {
            debug!(player_id = ?identity.player_id, "loaded persisted identity");
            initial.identity = identity;
        }
        let state = Arc::new(Mutex::new(initial));
        let loop_state = Arc::clone(&state);
        let shutdown_timeout = config.shutdown_timeout;

        let task = tokio::spawn(session_loop(
            connector,
            store,
            config,
            cmd_rx,
            event_tx,
            loop_state,
            conn_tx,
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            state,
            conn_rx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Join the game with a display name.
    ///
    /// The session loop attaches the persisted session token (if any) so the
    /// server can resume the prior session, and persists the name for future
    /// silent resumes.
    ///
    /// # Errors
    ///
    /// Returns [`SaladBowlError::NotConnected`] if the session loop has been
    /// torn down.
    pub fn join(&self, name: impl Into<String>) -> Result<()> {
        self.send(ClientMessage::ClientHello {
            name: name.into(),
            token: None,
        })
    }

    /// Update own display name and team choice in the lobby.
    ///
    /// # Errors
    ///
    /// Returns [`SaladBowlError::NotConnected`] if the session loop has been
    /// torn down.
    pub fn update_player_info(&self, name: impl Into<String>, team: Team) -> Result<()> {
        self.send(ClientMessage::UpdatePlayerInfo {
            name: name.into(),
            team,
        })
    }

    /// Ask the server to start the game (room owner only).
    ///
    /// # Errors
    ///
    /// Returns [`SaladBowlError::NotConnected`] if the session loop has been
    /// torn down.
    pub fn start_game(&self) -> Result<()> {
        self.send(ClientMessage::StartGame)
    }

    /// Adjust the game configuration (room owner only).
    ///
    /// # Errors
    ///
    /// Returns [`SaladBowlError::NotConnected`] if the session loop has been
    /// torn down.
    pub fn update_game_config(&self, config: GameConfig) -> Result<()> {
        self.send(ClientMessage::UpdateGameConfig(config))
    }

    /// Submit word suggestions for the bowl.
    ///
    /// # Errors
    ///
    /// Returns [`SaladBowlError::NotConnected`] if the session loop has been
    /// torn down.
    pub fn suggest_words(&self, words: Vec<String>) -> Result<()> {
        self.send(ClientMessage::WordSuggestions { words })
    }

    /// Report the current word as guessed, echoing its acknowledgement token
    /// (see [`WordRound::token`](crate::session::WordRound)).
    ///
    /// # Errors
    ///
    /// Returns [`SaladBowlError::NotConnected`] if the session loop has been
    /// torn down.
    pub fn word_success(&self, token: impl Into<String>) -> Result<()> {
        self.send(ClientMessage::WordSuccess {
            token: token.into(),
        })
    }

    /// Start a fresh connection cycle after the retry budget was exhausted.
    ///
    /// A no-op while connected or already retrying.
    ///
    /// # Errors
    ///
    /// Returns [`SaladBowlError::NotConnected`] if the session loop has been
    /// torn down.
    pub fn reconnect_now(&self) -> Result<()> {
        self.cmd_tx
            .send(Command::Reconnect)
            .map_err(|_| SaladBowlError::NotConnected)
    }

    /// Shut down the client, closing the transport and stopping the
    /// background task. No events are delivered after this returns.
    pub async fn shutdown(&mut self) {
        debug!("SaladBowlClient: shutdown requested");

        // Signal the session loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the session loop with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }
    }

    // ── State accessors ─────────────────────────────────────────────

    /// The current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.conn_rx.borrow()
    }

    /// A watch receiver for observing connection-state changes.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.conn_rx.clone()
    }

    /// Returns `true` if a transport is currently live.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Snapshot of the current identity.
    pub async fn identity(&self) -> Identity {
        self.state.lock().await.identity.clone()
    }

    /// Snapshot of the current roster, in arrival order.
    pub async fn roster(&self) -> Vec<PlayerInfo> {
        self.state.lock().await.roster.players().to_vec()
    }

    /// The current game phase.
    pub async fn phase(&self) -> GamePhase {
        self.state.lock().await.phase
    }

    /// Snapshot of the current word round.
    pub async fn word_round(&self) -> WordRound {
        self.state.lock().await.word_round.clone()
    }

    /// Snapshot of the guessing-bowl progress.
    pub async fn bowl_progress(&self) -> BowlProgress {
        self.state.lock().await.bowl_progress
    }

    /// The most recent non-fatal failure, for the UI to surface.
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue an intent to the session loop.
    ///
    /// Queuing succeeds in every connection state — intents buffered while
    /// reconnecting flush in order once a transport is live (§ retry policy).
    /// The only failure is a torn-down session loop.
    fn send(&self, msg: ClientMessage) -> Result<()> {
        self.cmd_tx
            .send(Command::Send(msg))
            .map_err(|_| SaladBowlError::NotConnected)
    }
}

impl std::fmt::Debug for SaladBowlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaladBowlClient")
            .field("connection_state", &self.connection_state())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for SaladBowlClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the session loop future to be dropped immediately.  The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending
        // it would trigger a graceful path that calls async `transport.close()`,
        // but there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

/// Outcome of one connection cycle's dialing phase.
enum ConnectOutcome<T> {
    /// A transport is live.
    Connected(T),
    /// Every attempt in the budget failed.
    Exhausted { attempts: u32 },
    /// Shutdown was signalled while dialing or backing off.
    Shutdown,
}

/// Why the connected phase ended.
enum LoopExit {
    /// The connection dropped abnormally; reconnect within budget.
    Dropped(Option<String>),
    /// Caller-initiated teardown; exit without retrying.
    Shutdown,
    /// The handle was dropped; exit without retrying.
    HandleGone,
}

/// Background session loop: dial, resume, apply, repeat.
///
/// Exits when:
/// - Shutdown is signalled (graceful teardown, no retry)
/// - The command channel closes (handle dropped)
#[allow(clippy::too_many_arguments)]
async fn session_loop<C, S>(
    connector: C,
    store: S,
    config: SaladBowlConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<SaladBowlEvent>,
    state: Arc<Mutex<SessionState>>,
    conn_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) where
    C: Connector,
    S: IdentityStore,
{
    debug!("session loop started");

    let mut fresh_session = true;
    // Intents caught while parked in the failed state, flushed on reconnect.
    let mut parked: VecDeque<ClientMessage> = VecDeque::new();

    'session: loop {
        // ── Dial with bounded retry ─────────────────────────────────
        let mut transport = match connect_with_retry(
            &connector,
            &config,
            fresh_session,
            &conn_tx,
            &event_tx,
            &mut shutdown_rx,
        )
        .await
        {
            ConnectOutcome::Connected(transport) => transport,
            ConnectOutcome::Shutdown => {
                let _ = conn_tx.send(ConnectionState::Failed);
                debug!("session loop exited during dial");
                return;
            }
            ConnectOutcome::Exhausted { attempts } => {
                let _ = conn_tx.send(ConnectionState::Failed);
                warn!(attempts, "retry budget exhausted, awaiting manual retry");
                emit_event(&event_tx, SaladBowlEvent::ConnectionFailed { attempts }).await;

                // Terminal until the caller asks for a fresh cycle. Intents
                // arriving here are parked, not lost.
                loop {
                    tokio::select! {
                        cmd = cmd_rx.recv() => match cmd {
                            Some(Command::Reconnect) => {
                                fresh_session = false;
                                continue 'session;
                            }
                            Some(Command::Send(msg)) => {
                                debug!("parking intent while connection is failed");
                                parked.push_back(msg);
                            }
                            None => {
                                debug!("handle dropped while failed, exiting");
                                return;
                            }
                        },
                        _ = &mut shutdown_rx => {
                            debug!("shutdown while failed, exiting");
                            return;
                        }
                    }
                }
            }
        };
        fresh_session = false;

        let _ = conn_tx.send(ConnectionState::Connected);
        emit_event(&event_tx, SaladBowlEvent::Connected).await;

        // ── Connected phase ─────────────────────────────────────────
        let exit = run_connected(
            &mut transport,
            &store,
            &mut cmd_rx,
            &event_tx,
            &state,
            &mut parked,
            &mut shutdown_rx,
        )
        .await;

        // Stale gameplay data must not be shown while disconnected.
        state.lock().await.reset_transient();

        match exit {
            LoopExit::Dropped(reason) => {
                let _ = conn_tx.send(ConnectionState::Retrying);
                emit_disconnected(&event_tx, reason).await;
                // Next cycle reconnects within a fresh attempt budget.
            }
            LoopExit::Shutdown | LoopExit::HandleGone => {
                let _ = conn_tx.send(ConnectionState::Failed);
                emit_disconnected(&event_tx, Some("client shut down".into())).await;
                debug!("session loop exited");
                return;
            }
        }
    }
}

/// Dial through the connector until a transport is live, the attempt budget
/// is spent, or shutdown is signalled. At most one attempt is in flight at a
/// time; backoff sleeps double per attempt and are cancellable by shutdown.
async fn connect_with_retry<C: Connector>(
    connector: &C,
    config: &SaladBowlConfig,
    fresh_session: bool,
    conn_tx: &watch::Sender<ConnectionState>,
    event_tx: &mpsc::Sender<SaladBowlEvent>,
    shutdown_rx: &mut tokio::sync::oneshot::Receiver<()>,
) -> ConnectOutcome<C::Transport> {
    let max_attempts = config.retry_attempts.max(1);

    for attempt in 1..=max_attempts {
        if attempt == 1 && fresh_session {
            let _ = conn_tx.send(ConnectionState::Connecting);
        } else {
            let _ = conn_tx.send(ConnectionState::Retrying);
        }

        if attempt > 1 {
            emit_event(
                event_tx,
                SaladBowlEvent::Retrying {
                    attempt,
                    max_attempts,
                },
            )
            .await;

            let delay = config.retry_base_delay * 2u32.saturating_pow(attempt - 2);
            debug!(attempt, ?delay, "backing off before reconnect attempt");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = &mut *shutdown_rx => return ConnectOutcome::Shutdown,
            }
        }

        tokio::select! {
            result = connector.connect() => match result {
                Ok(transport) => return ConnectOutcome::Connected(transport),
                Err(e) => warn!(attempt, max_attempts, "connection attempt failed: {e}"),
            },
            _ = &mut *shutdown_rx => return ConnectOutcome::Shutdown,
        }
    }

    ConnectOutcome::Exhausted {
        attempts: max_attempts,
    }
}

/// Drive one live connection: resume handshake, parked-intent flush, then the
/// select loop over commands, shutdown, and inbound messages.
async fn run_connected<T, S>(
    transport: &mut T,
    store: &S,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    event_tx: &mpsc::Sender<SaladBowlEvent>,
    state: &Arc<Mutex<SessionState>>,
    parked: &mut VecDeque<ClientMessage>,
    shutdown_rx: &mut tokio::sync::oneshot::Receiver<()>,
) -> LoopExit
where
    T: Transport,
    S: IdentityStore,
{
    // Greet the server first: silent resume when a display name is persisted.
    let identity = state.lock().await.identity.clone();
    if let Some(name) = identity.display_name {
        debug!(name = %name, resuming = identity.token.is_some(), "sending automatic hello");
        let hello = ClientMessage::ClientHello {
            name,
            token: identity.token,
        };
        if let Err(reason) = send_now(transport, &hello).await {
            return LoopExit::Dropped(Some(reason));
        }
    }

    // Flush intents parked while the connection was down, oldest first.
    while let Some(mut msg) = parked.pop_front() {
        prepare_outgoing(&mut msg, store, state).await;
        if let Err(reason) = send_now(transport, &msg).await {
            // The connection is gone again; keep the intent for next time.
            parked.push_front(msg);
            return LoopExit::Dropped(Some(reason));
        }
    }

    loop {
        tokio::select! {
            // Branch 1: outgoing intent from the client handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(mut msg)) => {
                        prepare_outgoing(&mut msg, store, state).await;
                        if let Err(reason) = send_now(transport, &msg).await {
                            error!("{reason}");
                            return LoopExit::Dropped(Some(reason));
                        }
                    }
                    Some(Command::Reconnect) => {
                        debug!("reconnect requested while connected, ignoring");
                    }
                    // Command channel closed — client handle dropped.
                    None => {
                        debug!("command channel closed, shutting down session loop");
                        let _ = transport.close().await;
                        return LoopExit::HandleGone;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut *shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                return LoopExit::Shutdown;
            }

            // Branch 3: incoming message from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        handle_incoming(&text, store, event_tx, state).await;
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        return LoopExit::Dropped(Some(format!("transport receive error: {e}")));
                    }
                    // Server closed the connection; not caller-initiated, so
                    // the session reconnects within budget.
                    None => {
                        debug!("connection closed by server");
                        return LoopExit::Dropped(None);
                    }
                }
            }
        }
    }
}

/// Fill in loop-owned fields of an outgoing intent before serialization.
///
/// A `ClientHello` from [`SaladBowlClient::join`] gets the persisted session
/// token attached, and the chosen display name is persisted for future silent
/// resumes.
async fn prepare_outgoing<S: IdentityStore>(
    msg: &mut ClientMessage,
    store: &S,
    state: &Arc<Mutex<SessionState>>,
) {
    if let ClientMessage::ClientHello { name, token } = msg {
        let mut session = state.lock().await;
        if token.is_none() {
            token.clone_from(&session.identity.token);
        }
        session.identity.display_name = Some(name.clone());
        store.save(&session.identity);
    }
}

/// Serialize and send one message. A serialization failure is a programming
/// bug and is logged without killing the connection; a transport failure is
/// returned as the disconnect reason.
async fn send_now<T: Transport>(
    transport: &mut T,
    msg: &ClientMessage,
) -> std::result::Result<(), String> {
    let json = match protocol::encode(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("failed to serialize client message: {e}");
            return Ok(());
        }
    };
    transport
        .send(json)
        .await
        .map_err(|e| format!("transport send error: {e}"))
}

/// Decode one inbound message, apply it to the session state, and emit the
/// matching event. Malformed input never changes gameplay state.
async fn handle_incoming<S: IdentityStore>(
    text: &str,
    store: &S,
    event_tx: &mpsc::Sender<SaladBowlEvent>,
    state: &Arc<Mutex<SessionState>>,
) {
    match protocol::decode(text) {
        Decoded::Message(message) => {
            let mut session = state.lock().await;
            let applied = session.apply(&message);
            let event = match applied {
                Applied::Hello { changed } => {
                    if changed {
                        // Token assignment is the persistence point: a reload
                        // after this instant can resume silently. A changed
                        // pair also covers the resume-rejected case — the
                        // server answered with a fresh registration and the
                        // client adopts it wholesale.
                        store.save(&session.identity);
                        debug!(player_id = ?session.identity.player_id, "identity persisted");
                    }
                    session
                        .identity
                        .player_id
                        .map(|player_id| SaladBowlEvent::Welcome { player_id })
                }
                Applied::Roster => Some(SaladBowlEvent::RosterUpdated {
                    players: session.roster.players().to_vec(),
                }),
                Applied::Phase { changed } => changed.then(|| SaladBowlEvent::PhaseChanged {
                    phase: session.phase,
                }),
                Applied::Word => Some(SaladBowlEvent::WordUpdated {
                    round: session.word_round.clone(),
                }),
                Applied::Bowl => Some(SaladBowlEvent::BowlUpdated {
                    progress: session.bowl_progress,
                }),
            };
            drop(session);
            if let Some(event) = event {
                emit_event(event_tx, event).await;
            }
        }
        Decoded::Unknown { kind } => {
            warn!(kind = %kind, "ignoring unknown server message kind");
            emit_event(event_tx, SaladBowlEvent::UnknownMessage { kind }).await;
        }
        Decoded::Malformed { detail } => {
            warn!("dropping malformed server message: {detail} — raw: {text}");
            state.lock().await.record_error(detail.clone());
            emit_event(event_tx, SaladBowlEvent::ProtocolViolation { detail }).await;
        }
    }
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the session loop.
async fn emit_event(event_tx: &mpsc::Sender<SaladBowlEvent>, event: SaladBowlEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`Disconnected`](SaladBowlEvent::Disconnected) event.
///
/// Uses `send().await` (blocking) instead of `try_send` because
/// `Disconnected` marks a state reset and must never be silently dropped.
async fn emit_disconnected(event_tx: &mpsc::Sender<SaladBowlEvent>, reason: Option<String>) {
    let event = SaladBowlEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
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
    use crate::store::MemoryIdentityStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    // ── Mock connector / transport ──────────────────────────────────

    type Scripted = Vec<Option<std::result::Result<String, SaladBowlError>>>;

    /// A mock transport that records sent messages and replays scripted
    /// responses, then hangs until the session is shut down.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, SaladBowlError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), SaladBowlError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, SaladBowlError>> {
            if let Some(item) = self.incoming.pop_front() {
                // An explicit `None` entry signals the server closing the
                // connection; `Some(result)` delivers the scripted message.
                item
            } else {
                // All scripted messages delivered — hang forever so the
                // session loop stays alive until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), SaladBowlError> {
            Ok(())
        }
    }

    /// A connector that replays a script of connect outcomes: `Some(incoming)`
    /// yields a transport with those scripted messages, `None` refuses the
    /// attempt. Attempts past the end of the script are refused.
    struct MockConnector {
        outcomes: StdMutex<VecDeque<Option<Scripted>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        attempts: Arc<AtomicU32>,
    }

    impl MockConnector {
        fn new(outcomes: Vec<Option<Scripted>>) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicU32>) {
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
        fn single(incoming: Scripted) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicU32>) {
            Self::new(vec![Some(incoming)])
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(&self) -> std::result::Result<MockTransport, SaladBowlError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
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

    // ── Helpers ─────────────────────────────────────────────────────

    fn server_hello_json(player_id: u32, token: &str) -> String {
        serde_json::to_string(&crate::protocol::ServerMessage::ServerHello {
            player_id,
            token: token.into(),
        })
        .unwrap()
    }

    fn fast_config() -> SaladBowlConfig {
        SaladBowlConfig::new().with_retry_base_delay(Duration::from_millis(5))
    }

    fn stored_identity() -> Identity {
        Identity {
            player_id: Some(7),
            token: Some("abc".into()),
            display_name: Some("Alice".into()),
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn config_defaults() {
        let config = SaladBowlConfig::new();
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn config_builder_methods() {
        let config = SaladBowlConfig::new()
            .with_retry_attempts(0)
            .with_event_channel_capacity(0)
            .with_shutdown_timeout(Duration::from_secs(5));
        // Clamped to the minimums.
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn connected_is_first_event() {
        let (connector, _sent, _attempts) = MockConnector::single(vec![]);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), fast_config());

        let first = events.recv().await.unwrap();
        assert!(
            matches!(first, SaladBowlEvent::Connected),
            "expected Connected as first event, got {first:?}"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn persisted_identity_resumes_silently() {
        let (connector, sent, _attempts) = MockConnector::single(vec![]);
        let store = MemoryIdentityStore::with_identity(stored_identity());
        let (mut client, mut events) = SaladBowlClient::start(connector, store, fast_config());

        let _ = events.recv().await; // Connected
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert!(!messages.is_empty(), "expected an automatic hello");
            let first: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(
                first,
                ClientMessage::ClientHello {
                    name: "Alice".into(),
                    token: Some("abc".into()),
                }
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn no_persisted_identity_sends_nothing() {
        let (connector, sent, _attempts) = MockConnector::single(vec![]);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), fast_config());

        let _ = events.recv().await; // Connected
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(sent.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn server_hello_persists_identity_to_store() {
        let (connector, _sent, _attempts) =
            MockConnector::single(vec![Some(Ok(server_hello_json(7, "t1")))]);
        let store = MemoryIdentityStore::new();
        // The loop owns the store; keep a second handle for assertions.
        let probe = Arc::new(store);
        struct Shared(Arc<MemoryIdentityStore>);
        impl IdentityStore for Shared {
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

        let (mut client, mut events) =
            SaladBowlClient::start(connector, Shared(Arc::clone(&probe)), fast_config());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, SaladBowlEvent::Welcome { player_id: 7 });

        let persisted = probe.load().expect("identity should be persisted");
        assert_eq!(persisted.player_id, Some(7));
        assert_eq!(persisted.token.as_deref(), Some("t1"));

        assert_eq!(client.identity().await.token.as_deref(), Some("t1"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_ends_in_failed() {
        // Three scripted refusals, then the session must stop dialing.
        let (connector, _sent, attempts) = MockConnector::new(vec![None, None, None]);
        let config = fast_config().with_retry_attempts(3);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), config);

        // Two Retrying events (attempts 2 and 3), then ConnectionFailed.
        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            SaladBowlEvent::Retrying {
                attempt: 2,
                max_attempts: 3
            }
        );
        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            SaladBowlEvent::Retrying {
                attempt: 3,
                max_attempts: 3
            }
        );
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, SaladBowlEvent::ConnectionFailed { attempts: 3 });

        assert_eq!(client.connection_state(), ConnectionState::Failed);
        // No fourth attempt was made.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn reconnect_now_starts_a_fresh_cycle() {
        // First cycle: one refusal. Second cycle: success.
        let (connector, _sent, attempts) = MockConnector::new(vec![None, Some(vec![])]);
        let config = fast_config().with_retry_attempts(1);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), config);

        let ev = events.recv().await.unwrap();
        assert_eq!(ev, SaladBowlEvent::ConnectionFailed { attempts: 1 });
        assert_eq!(client.connection_state(), ConnectionState::Failed);

        client.reconnect_now().unwrap();

        let ev = events.recv().await.unwrap();
        assert_eq!(ev, SaladBowlEvent::Connected);
        assert!(client.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn intents_parked_while_failed_flush_on_reconnect() {
        let (connector, sent, _attempts) = MockConnector::new(vec![None, Some(vec![])]);
        let config = fast_config().with_retry_attempts(1);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), config);

        let ev = events.recv().await.unwrap();
        assert_eq!(ev, SaladBowlEvent::ConnectionFailed { attempts: 1 });

        // Queue while failed — must not be lost.
        client.start_game().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sent.lock().unwrap().is_empty());

        client.reconnect_now().unwrap();
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, SaladBowlEvent::Connected);
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1);
            let msg: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(msg, ClientMessage::StartGame);
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn join_attaches_persisted_token() {
        let (connector, sent, _attempts) = MockConnector::single(vec![]);
        let store = MemoryIdentityStore::with_identity(Identity {
            player_id: Some(7),
            token: Some("abc".into()),
            display_name: None, // no name — no automatic hello
        });
        let (mut client, mut events) = SaladBowlClient::start(connector, store, fast_config());

        let _ = events.recv().await; // Connected
        client.join("Bob").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1);
            let msg: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(
                msg,
                ClientMessage::ClientHello {
                    name: "Bob".into(),
                    token: Some("abc".into()),
                }
            );
        }

        // The chosen name is now persisted for silent resume.
        assert_eq!(client.identity().await.display_name.as_deref(), Some("Bob"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn server_close_resets_transient_state_and_reconnects() {
        let playing = serde_json::to_string(&crate::protocol::ServerMessage::GameStatus {
            phase: GamePhase::Playing,
        })
        .unwrap();
        let bowl = serde_json::to_string(&crate::protocol::ServerMessage::BowlUpdate(
            crate::protocol::BowlPatch {
                current: Some(3),
                total: Some(10),
            },
        ))
        .unwrap();

        let (connector, _sent, attempts) = MockConnector::new(vec![
            Some(vec![Some(Ok(playing)), Some(Ok(bowl)), None]),
            Some(vec![]),
        ]);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), fast_config());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            SaladBowlEvent::PhaseChanged {
                phase: GamePhase::Playing
            }
        );
        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            SaladBowlEvent::BowlUpdated {
                progress: BowlProgress {
                    current: 3,
                    total: 10
                }
            }
        );

        // Server closes; the client must reset and reconnect.
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, SaladBowlEvent::Disconnected { .. }));
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, SaladBowlEvent::Connected);

        assert_eq!(client.bowl_progress().await, BowlProgress::default());
        assert_eq!(client.phase().await, GamePhase::Lobby);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_message_keeps_state_and_reports() {
        let roster = serde_json::to_string(&crate::protocol::ServerMessage::PlayerList {
            players: vec![crate::protocol::PlayerInfo {
                id: 1,
                name: "Alice".into(),
                team: None,
                is_owner: true,
                ready: false,
            }],
        })
        .unwrap();

        let (connector, _sent, _attempts) = MockConnector::single(vec![
            Some(Ok(roster)),
            Some(Ok(r#"{"type":"PlayerList","data":{"players":"nope"}}"#.into())),
        ]);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), fast_config());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // RosterUpdated
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, SaladBowlEvent::ProtocolViolation { .. }));

        // Last-known-good roster retained.
        assert_eq!(client.roster().await.len(), 1);
        assert!(client.last_error().await.is_some());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_message_kind_is_reported_not_fatal() {
        let (connector, _sent, _attempts) = MockConnector::single(vec![
            Some(Ok(r#"{"type":"ConfettiBlast","data":{}}"#.into())),
            Some(Ok(server_hello_json(7, "t1"))),
        ]);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), fast_config());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            SaladBowlEvent::UnknownMessage {
                kind: "ConfettiBlast".into()
            }
        );
        // The stream survives and the next message applies normally.
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, SaladBowlEvent::Welcome { player_id: 7 });

        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected_and_is_idempotent() {
        let (connector, _sent, _attempts) = MockConnector::single(vec![]);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), fast_config());

        let _ = events.recv().await; // Connected

        client.shutdown().await;
        client.shutdown().await; // should not panic

        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            SaladBowlEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert_eq!(client.connection_state(), ConnectionState::Failed);

        // Intents after teardown fail fast.
        let result = client.start_game();
        assert!(matches!(result, Err(SaladBowlError::NotConnected)));
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (connector, _sent, _attempts) = MockConnector::single(vec![]);
        let (client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), fast_config());

        let _ = events.recv().await; // Connected

        // Drop the client without calling shutdown; the loop is aborted.
        drop(client);

        // Drain remaining events — we only verify we don't hang or panic.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (connector, _sent, _attempts) = MockConnector::single(vec![]);
        let (mut client, mut events) =
            SaladBowlClient::start(connector, MemoryIdentityStore::new(), fast_config());

        let _ = events.recv().await; // Connected

        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("SaladBowlClient"));
        assert!(debug_str.contains("connection_state"));

        client.shutdown().await;
    }
}
