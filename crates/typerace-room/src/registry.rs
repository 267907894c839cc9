//! Room registry: finds or creates rooms by id and drops them once empty.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use typerace_protocol::{PlayerId, RoomId, ServerMessage};

use crate::{Delivery, Outbox, Player, Room, RoomConfig, RoomError};

/// Every live room, keyed by id.
///
/// A room is in the registry exactly while it has at least one member.
/// Creation is fused with the first join, and every operation that can
/// shrink a room re-checks emptiness while still holding the registry
/// lock. Lock order is always registry then room.
#[derive(Debug)]
pub struct RoomRegistry {
    config: RoomConfig,
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a player with a fresh id and an outbox sized by this
    /// registry's config.
    pub fn new_player(
        &self,
        display_name: impl Into<String>,
        room_id: RoomId,
    ) -> (Player, Outbox) {
        Player::new(
            display_name,
            room_id,
            self.config.effective_outbox_capacity(),
        )
    }

    /// Puts `player` into the room named by `player.room_id()`, creating
    /// the room first if needed.
    ///
    /// Two concurrent joins to a missing id end up in the same room.
    ///
    /// # Errors
    /// [`RoomError::AlreadyInRoom`] if the id is taken. A room created for
    /// this call is discarded again.
    pub async fn join(
        &self,
        player: Player,
    ) -> Result<(Arc<Room>, Delivery), RoomError> {
        let room_id = player.room_id().clone();
        let mut rooms = self.rooms.lock().await;

        let room = match rooms.get(&room_id) {
            Some(room) => Arc::clone(room),
            None => {
                let sentence = self.config.pick_sentence();
                let room = Arc::new(Room::new(room_id.clone(), sentence));
                tracing::info!(
                    %room_id,
                    target_sentence = room.target_sentence(),
                    "room created"
                );
                rooms.insert(room_id.clone(), Arc::clone(&room));
                room
            }
        };

        let result = room.join(player).await;
        Self::drop_if_empty(&mut rooms, &room).await;
        result.map(|delivery| (room, delivery))
    }

    /// Removes a player from a room and drops the room if that emptied it.
    ///
    /// Returns `None` if the room or the player was already gone.
    pub async fn remove_player(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Option<Delivery> {
        let mut rooms = self.rooms.lock().await;
        let room = Arc::clone(rooms.get(room_id)?);
        let delivery = room.leave(player_id).await;
        Self::drop_if_empty(&mut rooms, &room).await;
        delivery
    }

    /// [`Room::start`] on the named room.
    pub async fn start(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Option<Delivery> {
        let mut rooms = self.rooms.lock().await;
        let room = Arc::clone(rooms.get(room_id)?);
        let delivery = room.start(player_id).await;
        Self::drop_if_evicted_all(&mut rooms, &room, delivery.as_ref()).await;
        delivery
    }

    /// [`Room::finish`] on the named room.
    pub async fn finish(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Option<Delivery> {
        let mut rooms = self.rooms.lock().await;
        let room = Arc::clone(rooms.get(room_id)?);
        let delivery = room.finish(player_id).await;
        Self::drop_if_evicted_all(&mut rooms, &room, delivery.as_ref()).await;
        delivery
    }

    /// [`Room::report_progress`] on the named room.
    pub async fn report_progress(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        index: u32,
        mistakes: u32,
    ) -> Option<Delivery> {
        let mut rooms = self.rooms.lock().await;
        let room = Arc::clone(rooms.get(room_id)?);
        let delivery = room.report_progress(player_id, index, mistakes).await;
        Self::drop_if_evicted_all(&mut rooms, &room, delivery.as_ref()).await;
        delivery
    }

    /// Broadcasts to one room. Returns `None` if no such room exists.
    pub async fn broadcast(
        &self,
        room_id: &RoomId,
        msg: &ServerMessage,
    ) -> Option<Delivery> {
        let mut rooms = self.rooms.lock().await;
        let room = Arc::clone(rooms.get(room_id)?);
        let delivery = room.broadcast(msg).await;
        Self::drop_if_evicted_all(&mut rooms, &room, Some(&delivery)).await;
        Some(delivery)
    }

    /// Member count of every live room, sorted by id, read in one pass
    /// under the registry lock.
    pub async fn occupancy(&self) -> Vec<(RoomId, usize)> {
        let rooms = self.rooms.lock().await;
        let mut counts = Vec::with_capacity(rooms.len());
        for (room_id, room) in rooms.iter() {
            counts.push((room_id.clone(), room.len().await));
        }
        counts.sort();
        counts
    }

    async fn drop_if_evicted_all(
        rooms: &mut HashMap<RoomId, Arc<Room>>,
        room: &Room,
        delivery: Option<&Delivery>,
    ) {
        if delivery.is_some_and(Delivery::evicted_any) {
            Self::drop_if_empty(rooms, room).await;
        }
    }

    /// Caller holds the registry lock, so nobody sees the room between
    /// its last member going and its removal.
    async fn drop_if_empty(rooms: &mut HashMap<RoomId, Arc<Room>>, room: &Room) {
        if room.is_empty().await {
            rooms.remove(room.id());
            tracing::info!(room_id = %room.id(), "room removed");
        }
    }

    pub async fn room(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    pub async fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Ids of all live rooms, sorted.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<_> = self.rooms.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
