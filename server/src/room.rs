//! A single game session
//!
//! A room owns its roster, its generated terrain and each member's last
//! reported state. It is a plain state machine with no I/O of its own: events
//! for members are queued on their [`ClientHandle`]s and the caller decides
//! when things happen. Concurrency is handled one level up by the room actor.
//!
//! ```text
//! Waiting --(capacity reached)--> Ready --(start delay)--> Started --(last member leaves)--> Ended
//!    ^                              |
//!    +------(member leaves)---------+
//! ```

use crate::client_manager::ClientHandle;
use crate::config::GameConfig;
use crate::generator::{self, Terrain};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    player_floor, ClientId, GameSnapshot, NewPlayer, PlayerMoved, PlayerState, RoomMode,
    ServerEvent,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Accepting joins
    Waiting,
    /// Full, start pending
    Ready,
    Started,
    /// Started and later emptied; never reused
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Rejected,
    Joined,
    /// Accepted and the room is now full
    Filled,
}

impl JoinOutcome {
    pub fn accepted(&self) -> bool {
        !matches!(self, JoinOutcome::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub removed: bool,
    /// Whether the room can take another join
    pub accepting: bool,
    pub ended: bool,
}

pub struct Room {
    id: RoomId,
    mode: RoomMode,
    phase: RoomPhase,
    members: Vec<ClientHandle>,
    players: BTreeMap<ClientId, PlayerState>,
    terrain: Terrain,
    highest_floor: u32,
    config: Arc<GameConfig>,
    rng: StdRng,
}

impl Room {
    pub fn new(id: RoomId, mode: RoomMode, config: Arc<GameConfig>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ id.0),
            None => StdRng::from_entropy(),
        };

        Self {
            id,
            mode,
            phase: RoomPhase::Waiting,
            members: Vec::with_capacity(mode.capacity()),
            players: BTreeMap::new(),
            terrain: Terrain::new(),
            highest_floor: config.initial_floors,
            config,
            rng,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn mode(&self) -> RoomMode {
        self.mode
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase == RoomPhase::Started
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.mode.capacity()
    }

    pub fn is_accepting(&self) -> bool {
        self.phase == RoomPhase::Waiting && !self.is_full()
    }

    pub fn has_member(&self, client_id: ClientId) -> bool {
        self.members.iter().any(|member| member.id == client_id)
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn highest_floor(&self) -> u32 {
        self.highest_floor
    }

    pub fn player(&self, client_id: ClientId) -> Option<&PlayerState> {
        self.players.get(&client_id)
    }

    /// Adds a member if the room is still waiting and has space.
    pub fn join(&mut self, client: ClientHandle) -> JoinOutcome {
        if !self.is_accepting() || self.has_member(client.id) {
            return JoinOutcome::Rejected;
        }

        let spawn = PlayerState::spawn();
        self.broadcast(
            ServerEvent::NewPlayer(NewPlayer {
                id: client.id,
                x: spawn.x,
                y: spawn.y,
            }),
            None,
        );

        info!("Player {} added to {} ({})", client.id, self.id, self.mode);
        self.players.insert(client.id, spawn);
        self.members.push(client);

        if self.is_full() {
            info!("{} is full, starting game", self.id);
            self.phase = RoomPhase::Ready;
            JoinOutcome::Filled
        } else {
            JoinOutcome::Joined
        }
    }

    /// Removes a member and its player state.
    pub fn leave(&mut self, client_id: ClientId) -> LeaveOutcome {
        let removed = match self.members.iter().position(|m| m.id == client_id) {
            Some(index) => {
                self.members.remove(index);
                self.players.remove(&client_id);
                self.broadcast(ServerEvent::PlayerDisconnected(client_id), None);
                info!("Player {} left {}", client_id, self.id);
                true
            }
            None => false,
        };

        if removed {
            match self.phase {
                RoomPhase::Ready => self.phase = RoomPhase::Waiting,
                RoomPhase::Started if self.members.is_empty() => {
                    info!("{} is empty, ending", self.id);
                    self.phase = RoomPhase::Ended;
                }
                _ => {}
            }
        }

        LeaveOutcome {
            removed,
            accepting: self.is_accepting(),
            ended: self.phase == RoomPhase::Ended,
        }
    }

    /// Starts a full room: generates the first floors and sends the snapshot.
    ///
    /// Returns false if the room is not ready, e.g. a member left during the
    /// start delay.
    pub fn start(&mut self) -> bool {
        if self.phase != RoomPhase::Ready {
            return false;
        }

        self.phase = RoomPhase::Started;
        self.highest_floor = self.config.initial_floors;
        generator::extend(
            &mut self.terrain,
            self.highest_floor,
            &self.config.generator,
            &mut self.rng,
        );

        info!(
            "Game starting for {} with {} platforms",
            self.id,
            self.terrain.len()
        );

        let snapshot = GameSnapshot {
            map_data: self.terrain.platforms().to_vec(),
            players: self.players.clone(),
        };
        self.broadcast(ServerEvent::GameStart(snapshot), None);
        true
    }

    /// Applies a movement report from a member of a started room.
    ///
    /// The reported state is trusted as-is. When the player climbs within
    /// `lookahead_floors` of the generated top, terrain is extended and only
    /// the new records are pushed. Returns false if the report was ignored.
    pub fn report_movement(&mut self, client_id: ClientId, state: PlayerState) -> bool {
        if !self.is_started() || !self.has_member(client_id) {
            return false;
        }

        self.players.insert(client_id, state);
        debug!(
            "Player {} moved to ({}, {}), score: {}",
            client_id, state.x, state.y, state.score
        );

        self.broadcast(
            ServerEvent::PlayerMoved(PlayerMoved {
                id: client_id,
                x: state.x,
                y: state.y,
                score: state.score,
            }),
            Some(client_id),
        );

        let lookahead = self.config.lookahead_floors as i64;
        let floor = player_floor(state.y);
        if floor > self.highest_floor as i64 - lookahead {
            // one report never grows the terrain by more than max_extension_floors
            let ceiling = self.highest_floor as i64 + self.config.max_extension_floors as i64;
            self.highest_floor = floor
                .saturating_add(lookahead)
                .min(ceiling)
                .clamp(0, u32::MAX as i64) as u32;
            let appended = generator::extend(
                &mut self.terrain,
                self.highest_floor,
                &self.config.generator,
                &mut self.rng,
            )
            .to_vec();

            if !appended.is_empty() {
                debug!(
                    "{} extended to {} floors (+{} platforms)",
                    self.id,
                    self.terrain.floor_count(),
                    appended.len()
                );
                self.broadcast(ServerEvent::MapUpdate(appended), None);
            }
        }

        true
    }

    /// Advances moving platforms and pushes the full terrain to every member.
    ///
    /// Returns false when the room is not started or has no members.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.is_started() || self.members.is_empty() {
            return false;
        }

        self.terrain.advance(dt);
        self.broadcast(ServerEvent::MapUpdate(self.terrain.platforms().to_vec()), None);
        true
    }

    fn broadcast(&self, event: ServerEvent, exclude: Option<ClientId>) {
        for member in &self.members {
            if Some(member.id) == exclude {
                continue;
            }
            member.send(event.clone());
        }
    }
}
