//! Per-connection session: join, dispatch, keepalive, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running
//! [`SessionHandler::run`]. The flow is:
//!   1. Wait for `JoinRoom` → create the player and join its room
//!   2. Hand the player's outbox to the writer task
//!   3. Loop: receive messages → dispatch to the room
//!   4. On any exit: stop the writer, leave the room, close the socket
//!
//! The writer drains the outbox onto the socket and pings when the
//! outbox has been quiet for a keepalive interval. Either half ending
//! ends the session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use typerace_protocol::{ClientMessage, Codec, JsonCodec, PlayerId, RoomId};
use typerace_room::{Outbox, RoomRegistry};
use typerace_transport::{Connection, TransportError};

use crate::{ServerConfig, TyperaceError};

/// Runs sessions against one shared [`RoomRegistry`].
///
/// Cheap to clone: every connection task gets its own copy.
#[derive(Debug, Clone)]
pub struct SessionHandler {
    registry: Arc<RoomRegistry>,
    config: Arc<ServerConfig>,
    codec: JsonCodec,
}

/// Where a joined session lives.
struct Membership {
    player_id: PlayerId,
    room_id: RoomId,
}

impl SessionHandler {
    pub fn new(registry: Arc<RoomRegistry>, config: Arc<ServerConfig>) -> Self {
        Self {
            registry,
            config,
            codec: JsonCodec,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Drives one connection from accept to close.
    ///
    /// Returns `Ok(())` when the client goes away normally. Whatever the
    /// outcome, the player has left its room and the connection is closed
    /// by the time this returns.
    pub async fn run<C: Connection>(&self, conn: C) -> Result<(), TyperaceError> {
        let conn = Arc::new(conn);
        let conn_id = conn.id();
        tracing::debug!(%conn_id, "session started");

        let (handoff, outbox) = oneshot::channel();
        let mut writer = tokio::spawn(write_loop(
            Arc::clone(&conn),
            outbox,
            self.config.keepalive_interval,
            self.config.write_timeout,
        ));

        let mut membership = None;
        let result = tokio::select! {
            result = self.read_loop(conn.as_ref(), handoff, &mut membership) => result,
            joined = &mut writer => match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(%conn_id, error = %e, "writer task failed");
                    Ok(())
                }
            },
        };

        writer.abort();
        if let Some(Membership { player_id, room_id }) = membership {
            self.registry.remove_player(&room_id, &player_id).await;
        }
        match tokio::time::timeout(self.config.write_timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(%conn_id, error = %e, "close failed"),
            Err(_) => tracing::debug!(%conn_id, "close timed out"),
        }

        result
    }

    async fn read_loop<C: Connection>(
        &self,
        conn: &C,
        handoff: oneshot::Sender<Outbox>,
        membership: &mut Option<Membership>,
    ) -> Result<(), TyperaceError> {
        let conn_id = conn.id();

        // --- Phase 1: join ---
        let limit = self.config.join_timeout;
        let (channel_id, username) =
            match tokio::time::timeout(limit, self.await_join(conn)).await {
                Ok(Ok(Some(join))) => join,
                Ok(Ok(None)) => {
                    tracing::debug!(%conn_id, "closed before joining");
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    tracing::info!(%conn_id, "no JoinRoom in time, dropping connection");
                    return Err(TyperaceError::JoinTimeout(limit));
                }
            };

        let room_id = RoomId::from_channel(&channel_id);
        let (player, outbox) = self.registry.new_player(username, room_id.clone());
        let player_id = player.id().clone();
        // The room handle is not kept: everything after this goes through
        // the registry, so an eviction that empties the room also drops it.
        self.registry.join(player).await?;
        *membership = Some(Membership {
            player_id: player_id.clone(),
            room_id: room_id.clone(),
        });
        tracing::debug!(%conn_id, %player_id, %room_id, "session joined");

        if handoff.send(outbox).is_err() {
            return Ok(());
        }

        // --- Phase 2: dispatch ---
        while let Some(data) = conn.recv().await? {
            let msg: ClientMessage = match self.codec.decode(&data) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(%conn_id, %player_id, error = %e, "dropping malformed message");
                    continue;
                }
            };

            match msg {
                ClientMessage::StartGame => {
                    self.registry.start(&room_id, &player_id).await;
                }
                ClientMessage::ProgressUpdate {
                    current_index,
                    mistake_count,
                } => {
                    self.registry
                        .report_progress(&room_id, &player_id, current_index, mistake_count)
                        .await;
                }
                ClientMessage::GameFinished => {
                    self.registry.finish(&room_id, &player_id).await;
                }
                ClientMessage::JoinRoom { .. } => {
                    tracing::debug!(%conn_id, %player_id, "ignoring repeat JoinRoom");
                }
                ClientMessage::Unknown => {
                    tracing::debug!(%conn_id, %player_id, "ignoring unknown message type");
                }
            }
        }

        tracing::debug!(%conn_id, %player_id, "client closed connection");
        Ok(())
    }

    /// Reads until the first `JoinRoom`. Anything else is dropped.
    async fn await_join<C: Connection>(
        &self,
        conn: &C,
    ) -> Result<Option<(String, String)>, TyperaceError> {
        let conn_id = conn.id();
        while let Some(data) = conn.recv().await? {
            match self.codec.decode::<ClientMessage>(&data) {
                Ok(ClientMessage::JoinRoom {
                    channel_id,
                    username,
                }) => return Ok(Some((channel_id, username))),
                Ok(_) => {
                    tracing::debug!(%conn_id, "ignoring message before JoinRoom");
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "dropping malformed message");
                }
            }
        }
        Ok(None)
    }
}

/// Writer half: waits for the outbox, then forwards frames and keeps the
/// connection alive until the outbox closes or a send fails.
async fn write_loop<C: Connection>(
    conn: Arc<C>,
    outbox: oneshot::Receiver<Outbox>,
    keepalive: Duration,
    write_timeout: Duration,
) -> Result<(), TyperaceError> {
    // The reader dropped the handoff: it never joined.
    let Ok(mut outbox) = outbox.await else {
        return Ok(());
    };

    let mut ticker = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbox.recv() => {
                // The room dropped our sender while the reader is still
                // running, so this is an eviction.
                let Some(frame) = frame else {
                    tracing::info!(conn_id = %conn.id(), "outbox closed, ending session");
                    return Err(TyperaceError::Evicted);
                };
                bounded(write_timeout, conn.send(&frame)).await?;
                ticker.reset();
            }
            _ = ticker.tick() => {
                bounded(write_timeout, conn.ping()).await?;
                tracing::trace!(conn_id = %conn.id(), "keepalive ping");
            }
        }
    }
}

async fn bounded(
    limit: Duration,
    send: impl Future<Output = Result<(), TransportError>>,
) -> Result<(), TyperaceError> {
    match tokio::time::timeout(limit, send).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(TyperaceError::WriteTimeout(limit)),
    }
}
