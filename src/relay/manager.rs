//! Room registry and first-available assignment

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::store::ScoreStore;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::room::{MemberProfile, Room, RoomAssignment, RoomHandle, RoomInput};

/// Join failures surfaced to the connection handler
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("room closed during join")]
    RoomClosed,
}

/// Room listing entry for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatus {
    pub room_id: Uuid,
    pub occupancy: usize,
    pub capacity: usize,
    pub started: bool,
    pub created_at: DateTime<Utc>,
}

/// Owns the room registry. Rooms themselves run as independent tasks; the
/// manager only assigns members and routes mail to room mailboxes.
pub struct RoomManager {
    capacity: usize,
    countdown_ms: u64,
    rooms: Arc<DashMap<Uuid, RoomHandle>>,
    /// Serializes assignment so two concurrent joins can never both take
    /// the last slot of a room (capacity races are resolved here, not by
    /// rejecting members after the fact)
    assign_lock: Mutex<()>,
    score_store: Arc<dyn ScoreStore>,
}

impl RoomManager {
    pub fn new(config: &Config, score_store: Arc<dyn ScoreStore>) -> Self {
        Self {
            capacity: config.room_capacity,
            countdown_ms: config.countdown_ms,
            rooms: Arc::new(DashMap::new()),
            assign_lock: Mutex::new(()),
            score_store,
        }
    }

    /// Assign a player to the first room with a spare, unstarted slot,
    /// opening a new room when none qualifies.
    pub async fn join(
        &self,
        player_id: Uuid,
        profile: MemberProfile,
        tx: mpsc::Sender<ServerMsg>,
    ) -> Result<RoomAssignment, JoinError> {
        let _guard = self.assign_lock.lock().await;

        loop {
            let handle = match self.find_available() {
                Some(handle) => handle,
                None => self.open_room(),
            };

            // Reserve the slot before the command lands so the next join
            // under this lock sees the updated occupancy
            handle.occupancy.fetch_add(1, Ordering::SeqCst);

            let (reply_tx, reply_rx) = oneshot::channel();
            let input = RoomInput::Join {
                player_id,
                profile: profile.clone(),
                tx: tx.clone(),
                reply: reply_tx,
            };

            if handle.input_tx.send(input).await.is_err() {
                // The room task exited between lookup and send; prune the
                // stale handle and try again with a fresh room
                handle.occupancy.fetch_sub(1, Ordering::SeqCst);
                self.rooms.remove(&handle.id);
                continue;
            }

            return reply_rx.await.map_err(|_| JoinError::RoomClosed);
        }
    }

    /// Earliest-created room that is unstarted and below capacity
    fn find_available(&self) -> Option<RoomHandle> {
        self.rooms
            .iter()
            .filter(|entry| {
                let handle = entry.value();
                !handle.started.load(Ordering::SeqCst)
                    && handle.occupancy.load(Ordering::SeqCst) < self.capacity
            })
            .min_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.value().clone())
    }

    fn open_room(&self) -> RoomHandle {
        let id = Uuid::new_v4();
        let seed: u64 = rand::random();
        let (room, handle) = Room::new(
            id,
            self.capacity,
            self.countdown_ms,
            seed,
            self.score_store.clone(),
        );

        self.rooms.insert(id, handle.clone());

        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            room.run().await;
            rooms.remove(&id);
            info!(room_id = %id, "Room removed from registry");
        });

        handle
    }

    /// Route a relay message to the sender's room. A vanished room is not
    /// an error; the connection learns about it through silence.
    pub async fn relay(&self, room_id: Uuid, player_id: Uuid, msg: ClientMsg) {
        let handle = self.rooms.get(&room_id).map(|h| h.value().clone());
        if let Some(handle) = handle {
            let _ = handle
                .input_tx
                .send(RoomInput::Client { player_id, msg })
                .await;
        }
    }

    pub async fn leave(&self, room_id: Uuid, player_id: Uuid) {
        let handle = self.rooms.get(&room_id).map(|h| h.value().clone());
        if let Some(handle) = handle {
            let _ = handle.input_tx.send(RoomInput::Leave { player_id }).await;
        }
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn players_online(&self) -> usize {
        self.rooms
            .iter()
            .map(|entry| entry.value().occupancy.load(Ordering::SeqCst))
            .sum()
    }

    pub fn room_statuses(&self) -> Vec<RoomStatus> {
        let mut statuses: Vec<RoomStatus> = self
            .rooms
            .iter()
            .map(|entry| {
                let handle = entry.value();
                RoomStatus {
                    room_id: handle.id,
                    occupancy: handle.occupancy.load(Ordering::SeqCst),
                    capacity: self.capacity,
                    started: handle.started.load(Ordering::SeqCst),
                    created_at: handle.created_at,
                }
            })
            .collect();
        statuses.sort_by_key(|s| s.created_at);
        statuses
    }
}
