//! Incremental terrain generation for the vertical level
//!
//! Terrain is an append-only list of platform records ordered by floor. Each
//! call to [`extend`] adds floors until the requested floor count is reached,
//! continuing from wherever the previous call stopped. All randomness comes
//! from the caller's RNG, so a seeded RNG reproduces the same level.
//!
//! Floor kinds, in precedence order:
//! - floor 0 is a centered static launch platform that is always a bonus
//! - every `split_interval`-th floor is a full-width static floor cut into a
//!   left and a right segment, with a small bonus platform hovering over the gap
//! - every other floor is a single horizontally moving platform whose speed
//!   scales with the difficulty tier

use crate::config::GeneratorConfig;
use rand::Rng;
use shared::{
    MovementType, Platform, PlatformId, GROUND_Y, PLAYFIELD_LEFT, PLAYFIELD_RIGHT, WORLD_WIDTH,
};

/// Generated platforms of one room plus the cursor needed to continue generation
#[derive(Debug, Clone, Default)]
pub struct Terrain {
    platforms: Vec<Platform>,
    floors: u32,
    last_floor_y: f32,
    last_was_split: bool,
}

impl Terrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Number of distinct floor indices generated so far
    pub fn floor_count(&self) -> u32 {
        self.floors
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Advances every moving platform by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        for platform in self.platforms.iter_mut() {
            platform.advance(dt);
        }
    }
}

/// Appends floors until `target_floors` floors exist and returns the new records.
///
/// Asking for a count the terrain already has appends nothing.
pub fn extend<'a, R: Rng + ?Sized>(
    terrain: &'a mut Terrain,
    target_floors: u32,
    config: &GeneratorConfig,
    rng: &mut R,
) -> &'a [Platform] {
    let start = terrain.platforms.len();

    while terrain.floors < target_floors {
        let floor = terrain.floors;
        let y = next_floor_y(terrain, config);

        match terrain.platforms.last() {
            None => {
                let launch = launch_platform(y, config, rng);
                terrain.platforms.push(launch);
                terrain.last_was_split = false;
            }
            Some(_) if config.is_split_floor(floor) => {
                let segments = split_floor(floor, y, config, rng);
                terrain.platforms.extend(segments);
                terrain.last_was_split = true;
            }
            Some(previous) => {
                let platform = standard_floor(floor, y, previous, config, rng);
                terrain.platforms.push(platform);
                terrain.last_was_split = false;
            }
        }

        terrain.last_floor_y = y;
        terrain.floors += 1;
    }

    &terrain.platforms[start..]
}

/// Height of the next floor, always at least `min_vertical_spacing` above the last one
fn next_floor_y(terrain: &Terrain, config: &GeneratorConfig) -> f32 {
    if terrain.floors == 0 {
        return GROUND_Y;
    }

    let spacing = if terrain.last_was_split {
        config.post_split_spacing
    } else {
        config.base_spacing
    };

    let y = terrain.last_floor_y - spacing;
    if terrain.last_floor_y - y < config.min_vertical_spacing {
        terrain.last_floor_y - config.min_vertical_spacing
    } else {
        y
    }
}

fn launch_platform<R: Rng + ?Sized>(y: f32, config: &GeneratorConfig, rng: &mut R) -> Platform {
    let x = WORLD_WIDTH / 2.0;
    Platform {
        id: PlatformId::Floor(0),
        x,
        y,
        width: config.launch_width,
        height: config.fixed_height,
        movement_type: MovementType::None,
        speed: 0.0,
        base_x: x,
        base_y: y,
        is_static: true,
        is_bonus: true,
        is_special_bonus: rng.gen_bool(config.special_bonus_chance),
        floor: 0,
    }
}

fn split_floor<R: Rng + ?Sized>(
    floor: u32,
    y: f32,
    config: &GeneratorConfig,
    rng: &mut R,
) -> [Platform; 3] {
    let half_gap = config.gap_width / 2.0;
    let gap_center = rng.gen_range((PLAYFIELD_LEFT + half_gap)..(PLAYFIELD_RIGHT - half_gap));

    let left_width = gap_center - half_gap - PLAYFIELD_LEFT;
    let right_width = PLAYFIELD_RIGHT - (gap_center + half_gap);

    let segment = |id: PlatformId, x: f32, width: f32| Platform {
        id,
        x,
        y,
        width,
        height: config.fixed_height,
        movement_type: MovementType::None,
        speed: 0.0,
        base_x: x,
        base_y: y,
        is_static: true,
        is_bonus: false,
        is_special_bonus: false,
        floor,
    };

    let bonus_y = y - config.split_bonus_lift;
    let bonus = Platform {
        id: PlatformId::Bonus(floor),
        x: gap_center,
        y: bonus_y,
        width: config.split_bonus_width,
        height: config.fixed_height,
        movement_type: MovementType::None,
        speed: 0.0,
        base_x: gap_center,
        base_y: bonus_y,
        is_static: true,
        is_bonus: true,
        is_special_bonus: false,
        floor,
    };

    [
        segment(PlatformId::Left(floor), PLAYFIELD_LEFT + left_width / 2.0, left_width),
        segment(PlatformId::Right(floor), PLAYFIELD_RIGHT - right_width / 2.0, right_width),
        bonus,
    ]
}

fn standard_floor<R: Rng + ?Sized>(
    floor: u32,
    y: f32,
    previous: &Platform,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Platform {
    let (speed_min, speed_max) = config.speed_range(floor);
    let bonus_interval = rng.gen_range(config.bonus_interval.clone());

    let width = if rng.gen_bool(config.narrow_chance) {
        config.narrow_width
    } else {
        rng.gen_range(config.width_range.clone()) as f32
    };
    let height = rng.gen_range(config.height_range.clone()) as f32;
    let x = place_horizontally(floor, y, width, previous, config, rng);

    let is_bonus = floor % bonus_interval == 0
        || (floor > config.extra_bonus_after && rng.gen_bool(config.extra_bonus_chance));
    let is_special_bonus = is_bonus && rng.gen_bool(config.special_bonus_chance);

    Platform {
        id: PlatformId::Floor(floor),
        x,
        y,
        width,
        height,
        movement_type: MovementType::Horizontal,
        speed: rng.gen_range(speed_min..speed_max),
        base_x: x,
        base_y: y,
        is_static: false,
        is_bonus,
        is_special_bonus,
        floor,
    }
}

/// Picks a center x inside the playfield margins.
///
/// Chain floors stay near the previous record so the climb remains reachable.
/// When the new floor sits vertically close to the previous record, positions
/// overlapping it are retried, falling back to the far side of the playfield.
fn place_horizontally<R: Rng + ?Sized>(
    floor: u32,
    y: f32,
    width: f32,
    previous: &Platform,
    config: &GeneratorConfig,
    rng: &mut R,
) -> f32 {
    let min_x = PLAYFIELD_LEFT + width / 2.0;
    let max_x = PLAYFIELD_RIGHT - width / 2.0;
    let vertically_close = (previous.y - y).abs() < config.min_vertical_spacing;

    for _ in 0..config.placement_attempts {
        let x = if floor % config.chain_interval == 0 {
            let jitter = rng.gen_range(-config.chain_jitter..=config.chain_jitter);
            (previous.x + jitter).clamp(min_x, max_x)
        } else {
            rng.gen_range(min_x..=max_x)
        };

        if !(vertically_close && overlaps(x, width, previous)) {
            return x;
        }
    }

    if previous.x < WORLD_WIDTH / 2.0 {
        max_x
    } else {
        min_x
    }
}

fn overlaps(x: f32, width: f32, other: &Platform) -> bool {
    let half = width / 2.0;
    let other_half = other.width / 2.0;
    x + half > other.x - other_half && x - half < other.x + other_half
}
