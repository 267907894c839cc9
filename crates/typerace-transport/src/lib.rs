//! Transport abstraction layer for Typerace.
//!
//! Provides the [`Transport`], [`Incoming`] and [`Connection`] traits. The
//! session layer only ever sees a [`Connection`]: an ordered,
//! message-oriented, bidirectional channel to one client.
//!
//! Accepting is split in two. [`Transport::accept`] returns as soon as a
//! peer is at the door; the protocol handshake happens in
//! [`Incoming::upgrade`], which callers run off the accept loop so one
//! slow peer cannot hold up the next.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{IncomingWebSocket, WebSocketConnection, WebSocketTransport};

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

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// An accepted peer that has not finished its handshake yet.
    type Incoming: Incoming<Connection = Self::Connection>;

    /// Waits for the next peer. Does not wait for its handshake.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Incoming, TransportError>> + Send;

    /// Stops accepting new connections. Later calls to
    /// [`accept`](Self::accept) fail with [`TransportError::Shutdown`].
    fn shutdown(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// A peer whose handshake is still outstanding.
///
/// [`upgrade`](Self::upgrade) has no deadline of its own; wrap it in one.
pub trait Incoming: Send + 'static {
    type Connection: Connection;

    /// Runs the handshake and yields the established connection.
    fn upgrade(
        self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive messages.
///
/// Every method takes `&self` so one connection can be shared (behind an
/// `Arc`) by a reader task and a writer task at the same time.
/// Implementations must not let a pending [`recv`](Self::recv) block a
/// concurrent [`send`](Self::send).
pub trait Connection: Send + Sync + 'static {
    /// Sends one message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed, by either
    /// side. Fails with [`TransportError::Timeout`] if the connection has
    /// an idle timeout and nothing arrived in time.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Sends a keepalive frame that carries no application data.
    fn ping(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection. Any pending `recv` returns `Ok(None)`.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
