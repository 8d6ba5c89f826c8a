//! Period clock
//!
//! The dispatcher needs to know which period an inbound data message belongs
//! to. The event source announces the current period with a timeslot update;
//! the clock remembers it.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::debug;

use crate::domain::{NO_PERIOD, PeriodIndex};

/// Source of the current period
pub trait PeriodClock: Send + Sync {
    fn current_period(&self) -> PeriodIndex;

    /// Record a period announced by the event source
    fn observe(&self, _period: PeriodIndex) {}
}

/// Clock driven by timeslot updates; never moves backwards
#[derive(Debug)]
pub struct ManualClock {
    current: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(NO_PERIOD)
    }

    pub fn starting_at(period: PeriodIndex) -> Self {
        Self {
            current: AtomicI64::new(period),
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PeriodClock for ManualClock {
    fn current_period(&self) -> PeriodIndex {
        self.current.load(Ordering::SeqCst)
    }

    fn observe(&self, period: PeriodIndex) {
        let previous = self.current.fetch_max(period, Ordering::SeqCst);
        if previous > period {
            debug!(period, previous, "ManualClock::observe: stale update ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_before_first_period() {
        assert_eq!(ManualClock::new().current_period(), NO_PERIOD);
    }

    #[test]
    fn test_only_moves_forward() {
        let clock = ManualClock::starting_at(3);
        clock.observe(5);
        clock.observe(4);
        assert_eq!(clock.current_period(), 5);
    }
}
