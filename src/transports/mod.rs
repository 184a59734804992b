//! Transport implementations for the Salad Bowl game protocol.
//!
//! This module provides concrete [`Transport`](crate::Transport) and
//! [`Connector`](crate::transport::Connector) implementations behind feature
//! gates. Enable the corresponding Cargo feature to pull in a transport:
//!
//! | Feature                | Transport                                      |
//! |------------------------|------------------------------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] / [`WebSocketConnector`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), saladbowl_client::SaladBowlError> {
//! use saladbowl_client::{Transport, WebSocketTransport};
//!
//! let mut ws = WebSocketTransport::connect("ws://localhost:8080/ws").await?;
//! ws.send(r#"{"type":"StartGame"}"#.to_string()).await?;
//!
//! if let Some(Ok(msg)) = ws.recv().await {
//!     println!("server said: {msg}");
//! }
//!
//! ws.close().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
