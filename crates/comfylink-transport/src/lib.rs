//! Transport abstraction layer for comfylink.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how the client reaches the server's realtime channel. The supervisor only
//! ever talks to these traits, so tests can swap the network for an
//! in-memory pipe.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`
//! - `memory`: in-process [`MemoryConnector`] for tests and demos

mod error;
#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{Dial, MemoryConnection, MemoryConnector, MemoryLink};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One unit received from the server, before any decoding.
///
/// The text/binary distinction matters: the server sends JSON envelopes as
/// text frames and preview images as binary frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// A UTF-8 text frame.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

/// Everything needed to dial the server: the full URL (including the
/// `clientId` query parameter) and the headers to send with the upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// `ws://` or `wss://` URL.
    pub url: String,
    /// Extra handshake headers, usually credentials.
    pub headers: Vec<(String, String)>,
}

impl ConnectRequest {
    /// Creates a request with no extra headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds a handshake header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Opens new outgoing connections.
///
/// The returned futures are `Send` so the supervisor can drive each dial
/// from its own Tokio task.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Dials the server described by `request`.
    fn connect(
        &self,
        request: &ConnectRequest,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single open connection that yields frames.
pub trait Connection: Send + Sync + 'static {
    /// Receives the next frame from the server.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&self) -> impl Future<Output = Result<Option<RawFrame>, TransportError>> + Send;

    /// Closes the connection. Must not wait on a pending `recv`.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
