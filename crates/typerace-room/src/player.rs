//! Player state and the per-player outbound queue.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use typerace_protocol::{PlayerId, PlayerSnapshot, RoomId};

/// One encoded server message. Shared between every outbox a broadcast
/// reaches, so encoding happens once per broadcast.
pub type Frame = Arc<[u8]>;

/// A connected participant, owned by exactly one [`Room`](crate::Room).
///
/// The player holds the sending half of its outbox. Dropping the player
/// (leave, eviction) closes the outbox, which ends the session's writer.
#[derive(Debug)]
pub struct Player {
    id: PlayerId,
    display_name: String,
    room_id: RoomId,
    current_index: u32,
    mistake_count: u32,
    outbox: mpsc::Sender<Frame>,
}

impl Player {
    /// Creates a player with a freshly generated id, plus the receiving
    /// end of its outbox.
    pub fn new(
        display_name: impl Into<String>,
        room_id: RoomId,
        outbox_capacity: usize,
    ) -> (Self, Outbox) {
        Self::with_id(generate_player_id(), display_name, room_id, outbox_capacity)
    }

    /// Creates a player with a caller-chosen id.
    pub fn with_id(
        id: PlayerId,
        display_name: impl Into<String>,
        room_id: RoomId,
        outbox_capacity: usize,
    ) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(outbox_capacity.max(1));
        let player = Self {
            id,
            display_name: display_name.into(),
            room_id,
            current_index: 0,
            mistake_count: 0,
            outbox: tx,
        };
        (player, Outbox { rx })
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    pub fn mistake_count(&self) -> u32 {
        self.mistake_count
    }

    pub(crate) fn set_progress(&mut self, index: u32, mistakes: u32) {
        self.current_index = index;
        self.mistake_count = mistakes;
    }

    /// Enqueues a frame without waiting. Fails if the outbox is full or
    /// its receiver is gone.
    pub(crate) fn offer(
        &self,
        frame: Frame,
    ) -> Result<(), mpsc::error::TrySendError<Frame>> {
        self.outbox.try_send(frame)
    }

    /// Returns the public view of this player.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            username: self.display_name.clone(),
            current_index: self.current_index,
            mistake_count: self.mistake_count,
        }
    }
}

/// Receiving end of a player's outbound queue, drained by exactly one
/// writer. Strictly FIFO.
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::Receiver<Frame>,
}

impl Outbox {
    /// Waits for the next frame. Returns `None` once the player has left
    /// the room (or was evicted) and every queued frame was drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Returns the next queued frame without waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Returns `true` if the sending side was dropped.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}

/// Generates a random 32-character hex player id (128 bits of entropy).
pub fn generate_player_id() -> PlayerId {
    let bytes: [u8; 16] = rand::rng().random();
    PlayerId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}
