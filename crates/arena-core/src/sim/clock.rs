//! Fixed-step clock.
//!
//! Unlike a typical accumulator loop that runs `while accumulator >= dt` to
//! catch up after a stall, this clock forbids backlog accumulation: an
//! overrun period is tolerated, but the next period starts immediately with
//! at most one tick consumed, never several queued up to "catch up".

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
    tick: u64,
}

impl FixedClock {
    pub fn new(tick_rate: u32) -> Self {
        assert!(tick_rate > 0, "tick rate must be positive");
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
            tick: 0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Tick number `T`, the match-local counter starting at 0.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Feeds real elapsed seconds in and advances at most one tick. Returns
    /// the new tick number if one fired. Any surplus beyond one tick's worth
    /// is dropped, not queued — this is the "no catch-up" guarantee.
    pub fn advance(&mut self, elapsed_secs: f32) -> Option<u64> {
        self.accumulator += elapsed_secs;
        if self.accumulator < self.dt {
            return None;
        }
        self.accumulator = 0.0;
        self.tick += 1;
        Some(self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_once_per_dt() {
        let mut clock = FixedClock::new(125);
        assert!(clock.advance(clock.dt()).is_some());
        assert_eq!(clock.tick(), 1);
    }

    #[test]
    fn no_catch_up_after_overrun() {
        let mut clock = FixedClock::new(125);
        // Ten ticks' worth of elapsed time arrives in one call after a stall.
        let result = clock.advance(clock.dt() * 10.0);
        assert_eq!(result, Some(1));
        // The surplus nine ticks' worth of time was dropped, not queued.
        assert!(clock.advance(0.0).is_none());
    }

    #[test]
    fn sub_tick_elapsed_does_not_tick() {
        let mut clock = FixedClock::new(125);
        assert!(clock.advance(clock.dt() * 0.5).is_none());
        assert_eq!(clock.tick(), 0);
    }
}
