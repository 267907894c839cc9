//! Wire protocol for Typerace.
//!
//! This crate defines what clients and the server say to each other:
//! the JSON message types ([`ClientMessage`], [`ServerMessage`],
//! [`PlayerSnapshot`], [`PlayerId`], [`RoomId`]) and the [`Codec`] that
//! turns them into bytes. Failures surface as [`ProtocolError`].
//!
//! The protocol layer knows nothing about connections or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Room (mutation + broadcast)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientMessage, PlayerId, PlayerSnapshot, RoomId, ServerMessage};
