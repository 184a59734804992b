//! Transport abstraction for the Salad Bowl game protocol.
//!
//! The [`Transport`] trait defines a bidirectional text message channel
//! between the client and the game server. The protocol uses JSON text
//! messages, so every transport implementation must handle message framing
//! internally (e.g., WebSocket frames, length-prefixed TCP, QUIC streams).
//!
//! A [`Connector`] produces connected transports on demand: one call, one
//! connection attempt. The session loop owns the retry policy *around* the
//! connector — bounded attempts with backoff — and publishes the resulting
//! [`ConnectionState`] on a watch channel, so connectors stay free of any
//! reconnection logic.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use saladbowl_client::error::SaladBowlError;
//! use saladbowl_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), SaladBowlError> {
//!         // Send the JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, SaladBowlError>> {
//!         // Receive the next JSON text message
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), SaladBowlError> {
//!         // Gracefully shut down the connection
//!         todo!()
//!     }
//! }
//!
//! struct MyConnector { /* endpoint, TLS config, … */ }
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self) -> Result<MyTransport, SaladBowlError> {
//!         // Establish ONE connection attempt; the session loop retries.
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::SaladBowlError;

/// Observable state of the session's connection, published on a
/// `tokio::sync::watch` channel by the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// First connection attempt of a session is in flight.
    #[default]
    Connecting,
    /// A transport is live and messages flow.
    Connected,
    /// The connection dropped (or an attempt failed) and the client is
    /// retrying within its attempt budget.
    Retrying,
    /// The attempt budget is exhausted, or the session was torn down.
    /// Terminal until a manual retry is requested.
    Failed,
}

/// A bidirectional text message transport for the Salad Bowl game protocol.
///
/// Implementors shuttle serialized JSON strings between the client and
/// server. Each call to [`send`](Transport::send) transmits one complete JSON
/// message; each call to [`recv`](Transport::recv) returns one.
///
/// # Object Safety
///
/// This trait is object-safe, so `Box<dyn Transport>` works for dynamic
/// dispatch. The session loop uses the associated-type form via
/// [`Connector`] (monomorphized) for the common case.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is
/// used inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose data. Channel-based implementations (e.g.,
/// wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`SaladBowlError::TransportSend`] if the message could not be
    /// sent (e.g., connection broken, write buffer full).
    async fn send(&mut self, message: String) -> Result<(), SaladBowlError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed by the server
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<String, SaladBowlError>>;

    /// Close the transport connection gracefully.
    ///
    /// After calling this method, subsequent calls to [`send`](Transport::send)
    /// and [`recv`](Transport::recv) may return errors or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), SaladBowlError>;
}

/// Factory for connected [`Transport`]s.
///
/// One call to [`connect`](Connector::connect) is one connection attempt —
/// no retries, no backoff. The session loop invokes it sequentially, so at
/// most one attempt is ever in flight per session.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Establish one connection attempt.
    ///
    /// # Errors
    ///
    /// Returns any [`SaladBowlError`] describing why the attempt failed; the
    /// session loop decides whether another attempt is within budget.
    async fn connect(&self) -> Result<Self::Transport, SaladBowlError>;
}
