//! Fixed-rate broadcast clock
//!
//! Produces the elapsed time for each broadcast tick. Missed ticks are
//! skipped rather than replayed, and the measured delta is capped so a
//! stalled process does not make platforms jump across the playfield.

use crate::config::GameConfig;
use log::warn;
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Cap the maximum delta time to 50ms
pub const MAX_DELTA_TIME: f32 = 1.0 / 20.0;

pub struct BroadcastScheduler {
    interval: Interval,
    last_tick: Instant,
    tick_count: u64,
    tick_rate: u32,
}

impl BroadcastScheduler {
    /// Creates a scheduler ticking at the configured rate. Must be called inside a runtime.
    pub fn new(config: &GameConfig) -> Self {
        let mut interval = interval(config.tick_duration());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            interval,
            last_tick: Instant::now(),
            tick_count: 0,
            tick_rate: config.tick_rate,
        }
    }

    /// Waits for the next tick and returns the seconds elapsed since the previous one
    pub async fn tick(&mut self) -> f32 {
        self.interval.tick().await;

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        self.tick_count += 1;

        let dt = elapsed.as_secs_f32();
        if dt > MAX_DELTA_TIME {
            warn!(
                "Large delta time detected ({:.3}s), capping to {:.3}s",
                dt, MAX_DELTA_TIME
            );
        }
        clamp_delta(elapsed)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// True once per second of ticks, for periodic monitoring
    pub fn is_report_tick(&self) -> bool {
        self.tick_rate > 0 && self.tick_count % self.tick_rate as u64 == 0
    }
}

pub fn clamp_delta(elapsed: Duration) -> f32 {
    elapsed.as_secs_f32().min(MAX_DELTA_TIME)
}
