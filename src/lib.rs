//! # Salad Bowl Client
//!
//! Transport-agnostic Rust client for the Salad Bowl multiplayer party-game
//! protocol.
//!
//! This crate provides the session layer a game UI sits on: connection
//! lifecycle with bounded automatic retry, the typed wire protocol (handshake,
//! roster updates, phase transitions, gameplay events), identity persistence
//! for silent resume across reconnects, and the client-local state machine
//! that the UI renders from.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] and
//!   [`Connector`](transport::Connector) traits for any backend
//! - **Wire-compatible** — all protocol types match the game server's JSON
//!   format exactly
//! - **WebSocket built-in** — default `transport-websocket` feature provides
//!   [`WebSocketTransport`] / [`WebSocketConnector`]
//! - **Event-driven** — receive typed [`SaladBowlEvent`]s via a channel and
//!   observe [`ConnectionState`](transport::ConnectionState) on a watch
//!   channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use saladbowl_client::{
//!     MemoryIdentityStore, SaladBowlClient, SaladBowlConfig, SaladBowlEvent, WebSocketConnector,
//! };
//!
//! let connector = WebSocketConnector::for_game("ws://localhost:8080", Some("ROOM1"));
//! let store = MemoryIdentityStore::new();
//! let (client, mut events) = SaladBowlClient::start(connector, store, SaladBowlConfig::new());
//!
//! client.join("Alice")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SaladBowlEvent::PhaseChanged { phase } => { /* pick a screen */ }
//!         SaladBowlEvent::ConnectionFailed { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod protocol;
pub mod session;
pub mod store;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{SaladBowlClient, SaladBowlConfig};
pub use error::SaladBowlError;
pub use event::SaladBowlEvent;
pub use protocol::{ClientMessage, GameConfig, GamePhase, ServerMessage, Team};
pub use session::{Identity, SessionState};
pub use store::{IdentityStore, MemoryIdentityStore};
pub use transport::{ConnectionState, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
