//! Error types for the room layer.

use typerace_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
///
/// Most room operations have no failure mode: out-of-order status changes
/// and requests from non-members are ignored rather than reported.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A player with this id is already in the room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),
}
