//! Unified error type for the Typerace server.

use std::time::Duration;

use typerace_protocol::ProtocolError;
use typerace_room::RoomError;
use typerace_transport::TransportError;

/// Top-level error that wraps every crate-specific error plus the ways a
/// session can end on its own.
///
/// A session returns one of these when it ends abnormally. The server
/// logs it and moves on; it never reaches the client.
#[derive(Debug, thiserror::Error)]
pub enum TyperaceError {
    /// A transport-level error (connection, send, recv, idle timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (duplicate join).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The client never sent `JoinRoom`.
    #[error("no JoinRoom within {0:?}")]
    JoinTimeout(Duration),

    /// A single outbound send took too long.
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    /// The room dropped this player because its outbox overflowed.
    #[error("evicted from room")]
    Evicted,
}
