//! PeriodBarrier - repeating, monotonic completion barrier
//!
//! The producer reports "period N is complete"; the consumer asks to be woken
//! once anything newer than the last period it processed has completed. Asking
//! relative to what was already processed means a consumer never handles a
//! period twice and never skips one because several completions raced ahead of
//! it: it simply gets the newest value.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use super::{WaitError, abort_poisoned, lock_or_abort, wait_while};
use crate::domain::{NO_PERIOD, PeriodIndex};

#[derive(Debug)]
struct State {
    last_completed: PeriodIndex,
    violations: u64,
}

#[derive(Debug)]
pub struct PeriodBarrier {
    name: &'static str,
    state: Mutex<State>,
    cond: Condvar,
}

impl PeriodBarrier {
    pub fn new(name: &'static str) -> Self {
        debug!(%name, "PeriodBarrier::new: called");
        Self {
            name,
            state: Mutex::new(State {
                last_completed: NO_PERIOD,
                violations: 0,
            }),
            cond: Condvar::new(),
        }
    }

    /// Record `period` as the latest completed period and wake all waiters
    ///
    /// Moving backwards is an ordering violation: it is logged, counted and
    /// ignored. Returns whether the value was applied.
    pub fn advance(&self, period: PeriodIndex) -> bool {
        let mut state = lock_or_abort(&self.state, self.name);
        if period < state.last_completed {
            state.violations += 1;
            warn!(
                name = %self.name,
                period,
                last_completed = state.last_completed,
                "advance: period moved backwards, ignored"
            );
            return false;
        }
        state.last_completed = period;
        self.cond.notify_all();
        debug!(name = %self.name, period, "advance: notified waiters");
        true
    }

    /// Block until a period newer than `after` has completed; returns it
    pub fn await_through(&self, after: PeriodIndex) -> PeriodIndex {
        let state = lock_or_abort(&self.state, self.name);
        debug!(name = %self.name, after, last_completed = state.last_completed, "await_through: called");
        // Unbounded waits cannot time out
        let Ok(state) = wait_while(&self.cond, state, None, self.name, |s| s.last_completed <= after) else {
            abort_poisoned(self.name)
        };
        state.last_completed
    }

    /// Like [`await_through`](Self::await_through), bounded by `timeout` when given
    pub fn await_through_timeout(&self, after: PeriodIndex, timeout: Option<Duration>) -> Result<PeriodIndex, WaitError> {
        let state = lock_or_abort(&self.state, self.name);
        debug!(name = %self.name, after, ?timeout, "await_through_timeout: called");
        let state = wait_while(&self.cond, state, timeout, self.name, |s| s.last_completed <= after)?;
        Ok(state.last_completed)
    }

    pub fn last_completed(&self) -> PeriodIndex {
        lock_or_abort(&self.state, self.name).last_completed
    }

    /// Number of rejected backwards advances
    pub fn violations(&self) -> u64 {
        lock_or_abort(&self.state, self.name).violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_below_every_period() {
        let barrier = PeriodBarrier::new("test");
        assert_eq!(barrier.last_completed(), NO_PERIOD);
    }

    #[test]
    fn test_returns_immediately_when_already_past() {
        let barrier = PeriodBarrier::new("test");
        barrier.advance(5);
        assert_eq!(barrier.await_through(4), 5);
    }

    #[test]
    fn test_blocks_until_newer_period() {
        let barrier = Arc::new(PeriodBarrier::new("test"));
        barrier.advance(5);

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.await_through(5))
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!waiter.is_finished());

        barrier.advance(6);
        assert_eq!(waiter.join().unwrap(), 6);
    }

    #[test]
    fn test_repeat_completion_does_not_release_waiter() {
        let barrier = Arc::new(PeriodBarrier::new("test"));
        barrier.advance(3);

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.await_through(3))
        };
        thread::sleep(Duration::from_millis(30));
        assert!(barrier.advance(3));
        thread::sleep(Duration::from_millis(30));
        assert!(!waiter.is_finished());

        barrier.advance(4);
        assert_eq!(waiter.join().unwrap(), 4);
    }

    #[test]
    fn test_skipped_periods_return_newest() {
        let barrier = PeriodBarrier::new("test");
        barrier.advance(1);
        barrier.advance(2);
        barrier.advance(3);
        assert_eq!(barrier.await_through(0), 3);
    }

    #[test]
    fn test_backwards_advance_is_ignored() {
        let barrier = PeriodBarrier::new("test");
        assert!(barrier.advance(7));
        assert!(!barrier.advance(3));
        assert_eq!(barrier.last_completed(), 7);
        assert_eq!(barrier.violations(), 1);
    }

    #[test]
    fn test_repeated_advance_is_idempotent() {
        let barrier = PeriodBarrier::new("test");
        assert!(barrier.advance(4));
        assert!(barrier.advance(4));
        assert_eq!(barrier.last_completed(), 4);
        assert_eq!(barrier.violations(), 0);
    }

    #[test]
    fn test_timeout_when_nothing_completes() {
        let barrier = PeriodBarrier::new("test");
        barrier.advance(2);
        let limit = Duration::from_millis(20);
        assert_eq!(barrier.await_through_timeout(2, Some(limit)), Err(WaitError::TimedOut(limit)));
        assert_eq!(barrier.await_through_timeout(1, Some(limit)), Ok(2));
    }

    proptest! {
        #[test]
        fn prop_never_returns_at_or_below_request(
            periods in proptest::collection::vec(0i64..50, 1..20),
            after in -1i64..40,
        ) {
            let barrier = PeriodBarrier::new("prop");
            for p in &periods {
                barrier.advance(*p);
            }
            let result = barrier.await_through_timeout(after, Some(Duration::from_millis(1)));
            match result {
                Ok(period) => prop_assert!(period > after),
                Err(_) => prop_assert!(barrier.last_completed() <= after),
            }
        }
    }
}
