//! Render cycle pacing.
//!
//! Deadlines advance by whole periods from the previous deadline rather than
//! from the time the work finished, so per-cycle jitter does not accumulate.

use embassy_time::{Duration, Instant};

/// Deadline of the next cycle and the time left until it
#[derive(Debug, Clone, Copy)]
pub struct CycleTiming {
    pub next_deadline: Instant,
    /// Zero when running behind
    pub sleep_duration: Duration,
}

#[derive(Debug, Clone)]
pub struct CycleScheduler {
    next: Instant,
    period: Duration,
}

impl CycleScheduler {
    pub const fn new(period: Duration) -> Self {
        Self {
            next: Instant::from_ticks(0),
            period,
        }
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Takes effect from the next deadline on
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Start a cycle at `now`
    ///
    /// Falling more than two periods behind drops the backlog instead of
    /// running catch-up cycles back to back.
    pub fn tick(&mut self, now: Instant) -> CycleTiming {
        if now > self.next + self.period * 2 {
            self.next = now;
        }
        self.next += self.period;

        CycleTiming {
            next_deadline: self.next,
            sleep_duration: self.next.saturating_duration_since(now),
        }
    }
}
