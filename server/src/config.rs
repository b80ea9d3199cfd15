//! Tunable rules for terrain generation and session timing
//!
//! Every numeric rule the game depends on lives here so alternative rule sets
//! (spacing, tick rate, split gaps) can be selected without code changes.

use crate::error::ServerError;
use shared::RoomMode;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Placement and difficulty rules used by the platform generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Vertical distance between consecutive floors
    pub base_spacing: f32,
    /// Vertical distance above a split floor
    pub post_split_spacing: f32,
    /// Hard lower bound on the distance between consecutive floors
    pub min_vertical_spacing: f32,
    /// Every n-th floor (other than 0) is a split floor
    pub split_interval: u32,
    pub gap_width: f32,
    pub split_bonus_width: f32,
    /// How far above the split segments the gap bonus platform sits
    pub split_bonus_lift: f32,
    pub launch_width: f32,
    pub fixed_height: f32,
    /// Every n-th floor is placed near the previous one
    pub chain_interval: u32,
    pub chain_jitter: f32,
    pub placement_attempts: u32,
    pub floors_per_tier: u32,
    pub max_tier: u32,
    pub base_speed_min: f32,
    pub base_speed_max: f32,
    pub speed_per_tier: f32,
    pub bonus_interval: RangeInclusive<u32>,
    pub extra_bonus_chance: f64,
    pub extra_bonus_after: u32,
    pub special_bonus_chance: f64,
    pub narrow_chance: f64,
    pub narrow_width: f32,
    pub width_range: RangeInclusive<u32>,
    pub height_range: RangeInclusive<u32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_spacing: 120.0,
            post_split_spacing: 80.0,
            min_vertical_spacing: 30.0,
            split_interval: 20,
            gap_width: 120.0,
            split_bonus_width: 80.0,
            split_bonus_lift: 60.0,
            launch_width: 200.0,
            fixed_height: 32.0,
            chain_interval: 3,
            chain_jitter: 50.0,
            placement_attempts: 10,
            floors_per_tier: 20,
            max_tier: 4,
            base_speed_min: 50.0,
            base_speed_max: 300.0,
            speed_per_tier: 50.0,
            bonus_interval: 8..=12,
            extra_bonus_chance: 0.05,
            extra_bonus_after: 5,
            special_bonus_chance: 0.2,
            narrow_chance: 0.1,
            narrow_width: 50.0,
            width_range: 100..=300,
            height_range: 28..=36,
        }
    }
}

impl GeneratorConfig {
    /// Difficulty bucket for a floor index
    pub fn tier(&self, floor: u32) -> u32 {
        (floor / self.floors_per_tier).min(self.max_tier)
    }

    /// Horizontal speed range in px/s for a floor index
    pub fn speed_range(&self, floor: u32) -> (f32, f32) {
        let boost = self.tier(floor) as f32 * self.speed_per_tier;
        (self.base_speed_min + boost, self.base_speed_max + boost)
    }

    pub fn is_split_floor(&self, floor: u32) -> bool {
        floor != 0 && floor % self.split_interval == 0
    }
}

/// Server-wide configuration shared by every room
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub generator: GeneratorConfig,
    /// Broadcast ticks per second
    pub tick_rate: u32,
    /// Floors generated when a room starts
    pub initial_floors: u32,
    /// How many floors ahead of a player terrain is kept
    pub lookahead_floors: u32,
    /// Most floors a single movement report may add
    pub max_extension_floors: u32,
    /// Delay before a filled solo room starts, batching near-simultaneous joins
    pub solo_start_delay: Duration,
    /// Global cap on concurrent connections
    pub max_clients: usize,
    /// Fixed seed for reproducible terrain
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            tick_rate: 60,
            initial_floors: 15,
            lookahead_floors: 5,
            max_extension_floors: 50,
            solo_start_delay: Duration::from_millis(500),
            max_clients: 64,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn start_delay(&self, mode: RoomMode) -> Duration {
        match mode {
            RoomMode::Solo => self.solo_start_delay,
            _ => Duration::ZERO,
        }
    }

    /// Rejects rule sets the server cannot run with
    pub fn validate(&self) -> Result<(), ServerError> {
        let gen = &self.generator;

        if self.tick_rate == 0 {
            return Err(ServerError::InvalidConfig("tick rate must be positive".into()));
        }
        if self.max_clients == 0 {
            return Err(ServerError::InvalidConfig("max clients must be positive".into()));
        }
        if self.max_extension_floors == 0 {
            return Err(ServerError::InvalidConfig(
                "max extension floors must be positive".into(),
            ));
        }
        if gen.split_interval == 0 || gen.chain_interval == 0 || gen.floors_per_tier == 0 {
            return Err(ServerError::InvalidConfig("floor intervals must be positive".into()));
        }
        let spacings = [gen.base_spacing, gen.post_split_spacing, gen.min_vertical_spacing];
        if spacings.iter().any(|spacing| !spacing.is_finite()) {
            return Err(ServerError::InvalidConfig("spacing must be a finite number".into()));
        }
        if gen.min_vertical_spacing <= 0.0
            || gen.base_spacing < gen.min_vertical_spacing
            || gen.post_split_spacing < gen.min_vertical_spacing
        {
            return Err(ServerError::InvalidConfig(format!(
                "spacing must be at least the minimum vertical spacing of {}",
                gen.min_vertical_spacing
            )));
        }
        if !gen.gap_width.is_finite()
            || gen.gap_width <= 0.0
            || gen.gap_width >= shared::PLAYFIELD_WIDTH
        {
            return Err(ServerError::InvalidConfig(format!(
                "gap width must be within (0, {})",
                shared::PLAYFIELD_WIDTH
            )));
        }
        if gen.split_bonus_width >= gen.gap_width {
            return Err(ServerError::InvalidConfig(
                "split bonus platform must fit inside the gap".into(),
            ));
        }
        if *gen.width_range.end() as f32 >= shared::PLAYFIELD_WIDTH
            || gen.width_range.is_empty()
            || gen.height_range.is_empty()
            || gen.bonus_interval.is_empty()
            || *gen.bonus_interval.start() == 0
        {
            return Err(ServerError::InvalidConfig("invalid platform size ranges".into()));
        }

        Ok(())
    }
}
