//! Routing of join requests to rooms
//!
//! The registry keeps the rooms of each capacity class in creation order and
//! places a joining client in the first room that still accepts players,
//! creating a new room when none does. Rooms that end are reaped here.

use crate::client_manager::ClientHandle;
use crate::config::GameConfig;
use crate::error::ServerError;
use crate::room::{JoinOutcome, Room, RoomId};
use crate::room_actor::RoomHandle;
use log::{info, warn};
use shared::{ClientId, PlayerState, RoomMode};
use std::collections::HashMap;
use std::sync::Arc;

struct RoomEntry {
    handle: RoomHandle,
    /// Last known answer to "can this room take another join"
    accepting: bool,
}

pub struct RoomRegistry {
    config: Arc<GameConfig>,
    rooms: HashMap<RoomMode, Vec<RoomEntry>>,
    next_room_number: u64,
}

impl RoomRegistry {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self {
            config,
            rooms: HashMap::new(),
            next_room_number: 1,
        }
    }

    /// Places `client` in the first accepting room of `mode`, creating one if needed.
    pub async fn join_room(
        &mut self,
        client: ClientHandle,
        mode: RoomMode,
    ) -> Result<RoomId, ServerError> {
        let entries = self.rooms.entry(mode).or_default();

        for entry in entries.iter_mut().filter(|entry| entry.accepting) {
            match entry.handle.join(client.clone()).await {
                Ok(outcome) if outcome.accepted() => {
                    entry.accepting = outcome == JoinOutcome::Joined;
                    return Ok(entry.handle.id());
                }
                Ok(_) => entry.accepting = false,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.handle.id(), e);
                    entry.accepting = false;
                }
            }
        }

        let handle = self.create_room(mode);
        let outcome = handle.join(client).await?;
        let room_id = handle.id();

        self.rooms.entry(mode).or_default().push(RoomEntry {
            handle,
            accepting: outcome == JoinOutcome::Joined,
        });

        Ok(room_id)
    }

    /// Removes a client from its room, reaping the room if it ended
    pub async fn leave(&mut self, room_id: RoomId, client_id: ClientId) {
        let Some(entry) = self.entry_mut(room_id) else {
            return;
        };

        match entry.handle.leave(client_id).await {
            Ok(outcome) if !outcome.ended => entry.accepting = outcome.accepting,
            Ok(_) => {
                info!("{} ended, removing", room_id);
                self.remove(room_id);
            }
            Err(e) => {
                warn!("{}", e);
                self.remove(room_id);
            }
        }
    }

    /// Forwards a movement report to the client's room
    pub fn report_movement(&mut self, room_id: RoomId, client_id: ClientId, state: PlayerState) {
        let Some(entry) = self.entry_mut(room_id) else {
            return;
        };

        if let Err(e) = entry.handle.report_movement(client_id, state) {
            warn!("{}", e);
            self.remove(room_id);
        }
    }

    /// Sends one broadcast tick to every room
    pub fn tick_all(&mut self, dt: f32) {
        let mut closed = Vec::new();
        for entry in self.rooms.values().flatten() {
            if entry.handle.tick(dt).is_err() {
                closed.push(entry.handle.id());
            }
        }

        for room_id in closed {
            warn!("{} stopped unexpectedly, removing", room_id);
            self.remove(room_id);
        }
    }

    pub fn contains(&self, room_id: RoomId) -> bool {
        self.rooms
            .values()
            .flatten()
            .any(|entry| entry.handle.id() == room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.values().map(Vec::len).sum()
    }

    /// Rooms of `mode` in creation order
    pub fn rooms_of(&self, mode: RoomMode) -> Vec<RoomId> {
        self.rooms
            .get(&mode)
            .map(|entries| entries.iter().map(|entry| entry.handle.id()).collect())
            .unwrap_or_default()
    }

    fn create_room(&mut self, mode: RoomMode) -> RoomHandle {
        let room_id = RoomId(self.next_room_number);
        self.next_room_number += 1;

        info!("Creating {} ({})", room_id, mode);
        let room = Room::new(room_id, mode, Arc::clone(&self.config));
        RoomHandle::spawn(room, self.config.start_delay(mode))
    }

    fn entry_mut(&mut self, room_id: RoomId) -> Option<&mut RoomEntry> {
        self.rooms
            .values_mut()
            .flatten()
            .find(|entry| entry.handle.id() == room_id)
    }

    fn remove(&mut self, room_id: RoomId) {
        for entries in self.rooms.values_mut() {
            entries.retain(|entry| entry.handle.id() != room_id);
        }
    }
}
