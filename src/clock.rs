//! Fixed-timestep clock using an accumulator pattern.
//!
//! The host calls `update` with wall-clock timestamps at whatever cadence
//! it likes; the clock converts variable deltas into whole one-second
//! ticks, making progression deterministic and testable.

/// Milliseconds per progression tick.
pub const TICK_MS: f64 = 1_000.0;

/// Largest delta consumed per update. Longer gaps are the offline
/// simulator's job, not the live loop's.
const MAX_DELTA_MS: f64 = 10_000.0;

pub struct GameClock {
    /// Accumulated milliseconds not yet consumed as ticks.
    accumulator: f64,
    /// Total elapsed ticks since creation.
    pub total_ticks: u64,
    /// Timestamp of the last update (ms), None before the first.
    last_timestamp: Option<f64>,
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl GameClock {
    pub fn new() -> Self {
        Self {
            accumulator: 0.0,
            total_ticks: 0,
            last_timestamp: None,
        }
    }

    /// Feed a wall-clock timestamp and get back the number of whole
    /// ticks to process. The first call establishes the baseline and
    /// returns zero.
    pub fn update(&mut self, now_ms: f64) -> u32 {
        let delta = match self.last_timestamp {
            Some(prev) => (now_ms - prev).clamp(0.0, MAX_DELTA_MS),
            None => 0.0,
        };
        self.last_timestamp = Some(now_ms);

        self.accumulator += delta;
        let ticks = (self.accumulator / TICK_MS) as u32;
        self.accumulator -= ticks as f64 * TICK_MS;
        self.total_ticks += ticks as u64;
        ticks
    }

    /// Drop any banked partial tick and rebaseline at `now_ms`. Used
    /// after offline catch-up so the gap is not consumed twice.
    pub fn resync(&mut self, now_ms: f64) {
        self.accumulator = 0.0;
        self.last_timestamp = Some(now_ms);
    }
}
