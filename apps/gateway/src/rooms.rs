use std::collections::HashMap;
use std::sync::Arc;

use shared::ServerEvent;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// One member of a delivery room: the outbox of the session's writer task.
pub type MemberTx = mpsc::UnboundedSender<ServerEvent>;

type Room = HashMap<Uuid, MemberTx>;

/// Maps a delivery id to the sessions currently watching it. Rooms are
/// created on first join and removed with their last member. The mutex is
/// the only cross-connection shared mutation in the gateway.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<i64, Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: re-joining replaces the member's outbox entry and never
    /// duplicates membership.
    pub async fn join(&self, delivery_id: i64, session_id: Uuid, tx: MemberTx) {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(delivery_id).or_default().insert(session_id, tx);
    }

    pub async fn leave(&self, delivery_id: i64, session_id: Uuid) {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get_mut(&delivery_id) {
            room.remove(&session_id);
            if room.is_empty() {
                rooms.remove(&delivery_id);
            }
        }
    }

    /// Disconnect path: drop the session from every room it had joined.
    pub async fn remove_session(&self, session_id: Uuid, joined: impl IntoIterator<Item = i64>) {
        let mut rooms = self.rooms.lock().await;
        for delivery_id in joined {
            if let Some(room) = rooms.get_mut(&delivery_id) {
                room.remove(&session_id);
                if room.is_empty() {
                    rooms.remove(&delivery_id);
                }
            }
        }
    }

    /// Best-effort fan-out to every current member, optionally skipping the
    /// originator. Send failures mean the peer's writer task is gone; its
    /// own read loop handles the cleanup.
    pub async fn broadcast(&self, delivery_id: i64, event: ServerEvent, skip: Option<Uuid>) {
        let rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(&delivery_id) else {
            return;
        };
        for (session_id, tx) in room.iter() {
            if Some(*session_id) == skip {
                continue;
            }
            let _ = tx.send(event.clone());
        }
    }

    /// Drops a whole room; used when a delivery reaches a terminal status.
    pub async fn evict(&self, delivery_id: i64) {
        self.rooms.lock().await.remove(&delivery_id);
    }

    pub async fn member_count(&self, delivery_id: i64) -> usize {
        self.rooms
            .lock()
            .await
            .get(&delivery_id)
            .map_or(0, Room::len)
    }

    pub async fn has_room(&self, delivery_id: i64) -> bool {
        self.rooms.lock().await.contains_key(&delivery_id)
    }
}
