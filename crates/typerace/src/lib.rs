//! # Typerace
//!
//! Real-time multiplayer typing race server.
//!
//! Clients connect over WebSocket, join a room by id, and race to type
//! the room's sentence. The server relays each player's progress to the
//! whole room and announces the first finisher. It does not check what
//! anyone typed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use typerace::prelude::*;
//!
//! # async fn start() -> Result<(), TyperaceError> {
//! let config = ServerConfig::default();
//! let registry = Arc::new(RoomRegistry::new(config.room.clone()));
//! let server = TyperaceServer::builder()
//!     .config(config)
//!     .build(registry)
//!     .await?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::TyperaceError;
pub use handler::SessionHandler;
pub use server::{TyperaceServer, TyperaceServerBuilder};

/// Everything needed to run a server or drive sessions by hand.
pub mod prelude {
    pub use crate::{
        ServerConfig, SessionHandler, TyperaceError, TyperaceServer,
        TyperaceServerBuilder,
    };
    pub use typerace_protocol::{
        ClientMessage, PlayerId, PlayerSnapshot, RoomId, ServerMessage,
    };
    pub use typerace_room::{Room, RoomConfig, RoomRegistry, RoomStatus};
    pub use typerace_transport::{Connection, ConnectionId, TransportError};
}
