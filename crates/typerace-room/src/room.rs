//! A room: one race, its players, and its status.
//!
//! All mutation happens under the room's own lock, and every broadcast is
//! enqueued while that lock is held. That gives each member the same
//! message order without ever holding the lock across network I/O: the
//! room only `try_send`s into outboxes, it never writes to a connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use typerace_protocol::{
    Codec, JsonCodec, PlayerId, PlayerSnapshot, RoomId, ServerMessage,
};

use crate::{Frame, Player, RoomError, RoomStatus};

/// Result of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Players whose outbox accepted the frame.
    pub recipients: usize,
    /// Players removed because their outbox was full or closed.
    pub evicted: Vec<PlayerId>,
}

impl Delivery {
    /// Returns `true` if the broadcast removed anyone.
    pub fn evicted_any(&self) -> bool {
        !self.evicted.is_empty()
    }
}

/// A named group of players racing the same sentence.
///
/// Any broadcast may evict members and leave the room empty. A room held
/// outside the registry is not dropped when that happens; the
/// [`RoomRegistry`](crate::RoomRegistry) wrappers of these operations are.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    target_sentence: String,
    codec: JsonCodec,
    inner: Mutex<RoomInner>,
}

#[derive(Debug)]
struct RoomInner {
    /// Ordered by id so snapshots are deterministic.
    players: BTreeMap<PlayerId, Player>,
    status: RoomStatus,
    started_by: Option<PlayerId>,
}

impl Room {
    /// Creates an empty room in [`RoomStatus::Waiting`].
    pub fn new(id: RoomId, target_sentence: impl Into<String>) -> Self {
        Self {
            id,
            target_sentence: target_sentence.into(),
            codec: JsonCodec,
            inner: Mutex::new(RoomInner {
                players: BTreeMap::new(),
                status: RoomStatus::Waiting,
                started_by: None,
            }),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn target_sentence(&self) -> &str {
        &self.target_sentence
    }

    pub async fn status(&self) -> RoomStatus {
        self.inner.lock().await.status
    }

    /// The player whose `StartGame` moved the room to Playing.
    pub async fn started_by(&self) -> Option<PlayerId> {
        self.inner.lock().await.started_by.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.players.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.players.is_empty()
    }

    pub async fn contains(&self, player_id: &PlayerId) -> bool {
        self.inner.lock().await.players.contains_key(player_id)
    }

    /// Adds a player, sends them `Joined`, then tells the room
    /// `PlayerJoined`.
    ///
    /// # Errors
    /// [`RoomError::AlreadyInRoom`] if the id is taken. The room is left
    /// untouched and the rejected player is dropped.
    pub async fn join(&self, player: Player) -> Result<Delivery, RoomError> {
        let mut inner = self.inner.lock().await;
        let player_id = player.id().clone();
        if inner.players.contains_key(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, self.id.clone()));
        }

        tracing::info!(
            room_id = %self.id,
            %player_id,
            username = player.display_name(),
            players = inner.players.len() + 1,
            "player joined"
        );
        inner.players.insert(player_id.clone(), player);

        let players = inner.snapshot();
        let welcome = ServerMessage::Joined {
            player_id: player_id.clone(),
            target_sentence: self.target_sentence.clone(),
            players: players.clone(),
        };
        let mut delivery = Delivery::default();
        if let Some(frame) = self.encode(&welcome) {
            delivery = inner.deliver(&self.id, frame, Some(&player_id));
        }
        let announced =
            self.announce(&mut inner, &ServerMessage::PlayerJoined { players });
        delivery.evicted.extend(announced.evicted);
        Ok(delivery)
    }

    /// Removes a player and broadcasts the shrunken roster as
    /// `PlayerProgress`. Returns `None` if the player was not a member.
    pub async fn leave(&self, player_id: &PlayerId) -> Option<Delivery> {
        let mut inner = self.inner.lock().await;
        inner.players.remove(player_id)?;
        tracing::info!(
            room_id = %self.id,
            %player_id,
            players = inner.players.len(),
            "player left"
        );
        if inner.players.is_empty() {
            return Some(Delivery::default());
        }
        let players = inner.snapshot();
        Some(self.announce(&mut inner, &ServerMessage::PlayerProgress { players }))
    }

    /// Moves the room to `next` if that is the legal next step and
    /// `requested_by` is a member. Returns `true` if the status changed.
    pub async fn set_status(
        &self,
        next: RoomStatus,
        requested_by: &PlayerId,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        inner.transition(next, requested_by)
    }

    /// Handles `StartGame`: Waiting → Playing, then broadcasts
    /// `GameStarted`. Returns `None` if nothing changed.
    pub async fn start(&self, requested_by: &PlayerId) -> Option<Delivery> {
        let mut inner = self.inner.lock().await;
        if !inner.transition(RoomStatus::Playing, requested_by) {
            tracing::debug!(
                room_id = %self.id,
                player_id = %requested_by,
                status = %inner.status,
                "start request ignored"
            );
            return None;
        }
        tracing::info!(
            room_id = %self.id,
            player_id = %requested_by,
            target_sentence = %self.target_sentence,
            players = inner.players.len(),
            "game started"
        );
        let msg = ServerMessage::GameStarted {
            target_sentence: self.target_sentence.clone(),
        };
        Some(self.announce(&mut inner, &msg))
    }

    /// Handles `GameFinished`: Playing → Finished, then broadcasts the
    /// reporter as winner. Returns `None` if nothing changed.
    pub async fn finish(&self, player_id: &PlayerId) -> Option<Delivery> {
        let mut inner = self.inner.lock().await;
        if !inner.transition(RoomStatus::Finished, player_id) {
            tracing::debug!(
                room_id = %self.id,
                %player_id,
                status = %inner.status,
                "finish report ignored"
            );
            return None;
        }
        let winner = inner
            .players
            .get(player_id)
            .map(|p| p.display_name().to_string())
            .unwrap_or_default();
        tracing::info!(
            room_id = %self.id,
            %player_id,
            %winner,
            "game finished"
        );
        Some(self.announce(&mut inner, &ServerMessage::GameFinished { winner }))
    }

    /// Overwrites a member's reported progress. Nothing is checked against
    /// the sentence. Returns `false` for non-members.
    pub async fn update_progress(
        &self,
        player_id: &PlayerId,
        index: u32,
        mistakes: u32,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.players.get_mut(player_id) {
            Some(player) => {
                player.set_progress(index, mistakes);
                true
            }
            None => false,
        }
    }

    /// Handles `ProgressUpdate`: stores the numbers and broadcasts
    /// `PlayerProgress`. Returns `None` for non-members.
    pub async fn report_progress(
        &self,
        player_id: &PlayerId,
        index: u32,
        mistakes: u32,
    ) -> Option<Delivery> {
        let mut inner = self.inner.lock().await;
        inner.players.get_mut(player_id)?.set_progress(index, mistakes);
        tracing::trace!(room_id = %self.id, %player_id, index, mistakes, "progress");
        let players = inner.snapshot();
        Some(self.announce(&mut inner, &ServerMessage::PlayerProgress { players }))
    }

    /// Point-in-time copy of every member's progress, sorted by id.
    pub async fn snapshot(&self) -> Vec<PlayerSnapshot> {
        self.inner.lock().await.snapshot()
    }

    /// Delivers `msg` to every member's outbox.
    pub async fn broadcast(&self, msg: &ServerMessage) -> Delivery {
        let mut inner = self.inner.lock().await;
        self.announce(&mut inner, msg)
    }

    fn announce(&self, inner: &mut RoomInner, msg: &ServerMessage) -> Delivery {
        match self.encode(msg) {
            Some(frame) => inner.deliver(&self.id, frame, None),
            None => Delivery::default(),
        }
    }

    fn encode(&self, msg: &ServerMessage) -> Option<Frame> {
        match self.codec.encode(msg) {
            Ok(bytes) => Some(Frame::from(bytes)),
            Err(e) => {
                tracing::error!(room_id = %self.id, error = %e, "failed to encode broadcast");
                None
            }
        }
    }
}

impl RoomInner {
    fn snapshot(&self) -> Vec<PlayerSnapshot> {
        self.players.values().map(Player::snapshot).collect()
    }

    fn transition(&mut self, next: RoomStatus, requested_by: &PlayerId) -> bool {
        if !self.players.contains_key(requested_by)
            || !self.status.can_transition_to(next)
        {
            return false;
        }
        self.status = next;
        if next == RoomStatus::Playing {
            self.started_by = Some(requested_by.clone());
        }
        true
    }

    /// Offers `frame` to one player (`only`) or to everyone. Players that
    /// cannot take it are removed on the spot; dropping them closes their
    /// outbox so their writer shuts the connection down.
    fn deliver(
        &mut self,
        room_id: &RoomId,
        frame: Frame,
        only: Option<&PlayerId>,
    ) -> Delivery {
        let mut delivery = Delivery::default();
        for (player_id, player) in &self.players {
            if only.is_some_and(|target| target != player_id) {
                continue;
            }
            match player.offer(Arc::clone(&frame)) {
                Ok(()) => delivery.recipients += 1,
                Err(e) => {
                    let reason = match e {
                        mpsc::error::TrySendError::Full(_) => "outbox full",
                        mpsc::error::TrySendError::Closed(_) => "outbox closed",
                    };
                    tracing::warn!(%room_id, %player_id, reason, "evicting player");
                    delivery.evicted.push(player_id.clone());
                }
            }
        }
        for player_id in &delivery.evicted {
            self.players.remove(player_id);
        }
        delivery
    }
}
