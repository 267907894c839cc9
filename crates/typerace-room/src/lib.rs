//! Rooms, players, and the room registry for Typerace.
//!
//! A [`Room`] owns its [`Player`]s and a [`RoomStatus`]. Every change to a
//! room is followed by a broadcast, encoded once and pushed into each
//! member's bounded [`Outbox`]. A member whose outbox is full or closed is
//! evicted instead of slowing the room down.
//!
//! The [`RoomRegistry`] maps room ids to rooms, creating a room on its
//! first join and dropping it when its last member leaves.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: find-or-create, removal, pruning
//! - [`Room`]: membership, status, progress, broadcast
//! - [`Player`] / [`Outbox`]: one participant and its outbound queue
//! - [`RoomConfig`]: outbox capacity and the sentence pool

mod config;
mod error;
mod player;
mod registry;
mod room;

pub use config::{
    CLASSIC_SENTENCES, DEFAULT_SENTENCE, MIN_OUTBOX_CAPACITY, RoomConfig,
    RoomStatus,
};
pub use error::RoomError;
pub use player::{Frame, Outbox, Player, generate_player_id};
pub use registry::RoomRegistry;
pub use room::{Delivery, Room};
