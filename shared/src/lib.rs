use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const PLAYFIELD_LEFT: f32 = 60.0;
pub const PLAYFIELD_RIGHT: f32 = 740.0;
pub const PLAYFIELD_WIDTH: f32 = PLAYFIELD_RIGHT - PLAYFIELD_LEFT;
pub const GROUND_Y: f32 = 600.0;
pub const FLOOR_HEIGHT: f32 = 120.0;
pub const SPAWN_X: f32 = 400.0;
pub const SPAWN_Y: f32 = 550.0;

pub type ClientId = u32;

/// Capacity class a client asks for when joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomMode {
    Solo,
    Duo,
    Quad,
    Octet,
}

impl RoomMode {
    pub const ALL: [RoomMode; 4] = [RoomMode::Solo, RoomMode::Duo, RoomMode::Quad, RoomMode::Octet];

    /// Parses the wire name of a class. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "solo" => Some(RoomMode::Solo),
            "duo" => Some(RoomMode::Duo),
            "quad" => Some(RoomMode::Quad),
            "octet" => Some(RoomMode::Octet),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RoomMode::Solo => "solo",
            RoomMode::Duo => "duo",
            RoomMode::Quad => "quad",
            RoomMode::Octet => "octet",
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            RoomMode::Solo => 1,
            RoomMode::Duo => 2,
            RoomMode::Quad => 4,
            RoomMode::Octet => 8,
        }
    }
}

impl fmt::Display for RoomMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a platform record.
///
/// Ordinary floors are identified by their floor index and travel as a JSON
/// number. The three records of a split floor travel as strings such as
/// `"20_left"`, `"20_right"` and `"20_bonus"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPlatformId", into = "RawPlatformId")]
pub enum PlatformId {
    Floor(u32),
    Left(u32),
    Right(u32),
    Bonus(u32),
}

impl PlatformId {
    pub fn floor(&self) -> u32 {
        match *self {
            PlatformId::Floor(f) | PlatformId::Left(f) | PlatformId::Right(f) | PlatformId::Bonus(f) => f,
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformId::Floor(n) => write!(f, "{}", n),
            PlatformId::Left(n) => write!(f, "{}_left", n),
            PlatformId::Right(n) => write!(f, "{}_right", n),
            PlatformId::Bonus(n) => write!(f, "{}_bonus", n),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPlatformId {
    Number(u32),
    Text(String),
}

impl From<PlatformId> for RawPlatformId {
    fn from(id: PlatformId) -> Self {
        match id {
            PlatformId::Floor(n) => RawPlatformId::Number(n),
            other => RawPlatformId::Text(other.to_string()),
        }
    }
}

impl TryFrom<RawPlatformId> for PlatformId {
    type Error = String;

    fn try_from(raw: RawPlatformId) -> Result<Self, Self::Error> {
        let text = match raw {
            RawPlatformId::Number(n) => return Ok(PlatformId::Floor(n)),
            RawPlatformId::Text(text) => text,
        };

        let (floor, kind) = text
            .split_once('_')
            .ok_or_else(|| format!("malformed platform id {:?}", text))?;
        let floor: u32 = floor
            .parse()
            .map_err(|_| format!("malformed platform id {:?}", text))?;

        match kind {
            "left" => Ok(PlatformId::Left(floor)),
            "right" => Ok(PlatformId::Right(floor)),
            "bonus" => Ok(PlatformId::Bonus(floor)),
            _ => Err(format!("unknown platform kind {:?}", kind)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    None,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub id: PlatformId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub movement_type: MovementType,
    /// Signed horizontal speed in px/s.
    pub speed: f32,
    pub base_x: f32,
    pub base_y: f32,
    pub is_static: bool,
    pub is_bonus: bool,
    pub is_special_bonus: bool,
    pub floor: u32,
}

impl Platform {
    pub fn is_moving(&self) -> bool {
        !self.is_static && self.movement_type == MovementType::Horizontal
    }

    /// Horizontal range the platform center may occupy while oscillating.
    pub fn travel_bounds(&self) -> (f32, f32) {
        let half = self.width / 2.0;
        (PLAYFIELD_LEFT + half, PLAYFIELD_RIGHT - half)
    }

    /// Moves a horizontal platform by `speed * dt`, bouncing off the playfield edges.
    pub fn advance(&mut self, dt: f32) {
        if !self.is_moving() {
            return;
        }

        self.x += self.speed * dt;

        let (min_x, max_x) = self.travel_bounds();
        if self.x > max_x {
            self.x = max_x;
            self.speed = -self.speed.abs();
        } else if self.x < min_x {
            self.x = min_x;
            self.speed = self.speed.abs();
        }
    }
}

/// Last self-reported state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub score: i64,
}

impl PlayerState {
    pub fn spawn() -> Self {
        Self {
            x: SPAWN_X,
            y: SPAWN_Y,
            score: 0,
        }
    }
}

/// Floor index a player at height `y` is standing on.
pub fn player_floor(y: f32) -> i64 {
    ((GROUND_Y - y) / FLOOR_HEIGHT).floor() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub map_data: Vec<Platform>,
    pub players: BTreeMap<ClientId, PlayerState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerMoved {
    pub id: ClientId,
    pub x: f32,
    pub y: f32,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewPlayer {
    pub id: ClientId,
    pub x: f32,
    pub y: f32,
}

/// Events sent by clients, one JSON text frame each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Carries the raw class name so unknown classes can be dropped quietly.
    JoinRoom(String),
    PlayerMovement(PlayerState),
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    GameStart(GameSnapshot),
    MapUpdate(Vec<Platform>),
    PlayerMoved(PlayerMoved),
    NewPlayer(NewPlayer),
    PlayerDisconnected(ClientId),
    ServerFull(String),
}
