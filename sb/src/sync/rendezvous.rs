//! RendezvousBarrier - signal/wait handoff with optional rearm
//!
//! Used once per session for the start signal, and with `reset()` as a
//! repeating handoff (see [`super::DelayProbe`]).
//!
//! Cycles are numbered from 0. A cycle opens when `signal()` is called and ends
//! when `reset()` is called. Signals that arrive while a cycle is still open are
//! queued and each opens its own cycle on a later `reset()`, so no signal is
//! merged into another. A waiter remembers the cycle it started waiting in and
//! is released once that cycle opens, even if a `reset()` closes it again
//! before the waiter gets the lock back.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use tracing::debug;

use super::{WaitError, lock_or_abort, wait_while};

#[derive(Debug, Default)]
struct State {
    signaled: bool,
    cycle: u64,
    queued: u64,
}

#[derive(Debug)]
pub struct RendezvousBarrier {
    name: &'static str,
    state: Mutex<State>,
    cond: Condvar,
}

impl RendezvousBarrier {
    pub fn new(name: &'static str) -> Self {
        debug!(%name, "RendezvousBarrier::new: called");
        Self {
            name,
            state: Mutex::new(State::default()),
            cond: Condvar::new(),
        }
    }

    /// Open the current cycle and wake every waiter
    ///
    /// If the current cycle is already open the signal is queued for the next
    /// one. Returns the cycle the signal belongs to.
    pub fn signal(&self) -> u64 {
        let mut state = lock_or_abort(&self.state, self.name);
        if state.signaled {
            state.queued += 1;
            debug!(name = %self.name, cycle = state.cycle, queued = state.queued, "signal: cycle in flight, queued");
            return state.cycle + state.queued;
        }
        state.signaled = true;
        self.cond.notify_all();
        debug!(name = %self.name, cycle = state.cycle, "signal: cycle opened");
        state.cycle
    }

    /// Block until the cycle current at entry has been signaled
    pub fn wait(&self) -> u64 {
        let state = lock_or_abort(&self.state, self.name);
        let entry_cycle = state.cycle;
        debug!(name = %self.name, entry_cycle, signaled = state.signaled, "wait: called");
        // Unbounded waits cannot time out
        let _released = wait_while(&self.cond, state, None, self.name, |s| {
            !s.signaled && s.cycle == entry_cycle
        });
        debug!(name = %self.name, entry_cycle, "wait: released");
        entry_cycle
    }

    /// Like [`wait`](Self::wait), giving up after `timeout` when one is given
    pub fn wait_timeout(&self, timeout: Option<Duration>) -> Result<u64, WaitError> {
        let state = lock_or_abort(&self.state, self.name);
        let entry_cycle = state.cycle;
        debug!(name = %self.name, entry_cycle, ?timeout, "wait_timeout: called");
        wait_while(&self.cond, state, timeout, self.name, |s| {
            !s.signaled && s.cycle == entry_cycle
        })?;
        Ok(entry_cycle)
    }

    /// Close the open cycle and rearm for the next one
    ///
    /// A queued signal immediately opens the new cycle. Calling this while no
    /// cycle is open does nothing. Returns the cycle now current.
    pub fn reset(&self) -> u64 {
        let mut state = lock_or_abort(&self.state, self.name);
        if !state.signaled {
            debug!(name = %self.name, cycle = state.cycle, "reset: already armed");
            return state.cycle;
        }
        state.cycle += 1;
        if state.queued > 0 {
            state.queued -= 1;
            self.cond.notify_all();
            debug!(name = %self.name, cycle = state.cycle, queued = state.queued, "reset: opened queued cycle");
        } else {
            state.signaled = false;
            debug!(name = %self.name, cycle = state.cycle, "reset: rearmed");
        }
        state.cycle
    }

    /// Non-blocking check of the current cycle
    pub fn is_signaled(&self) -> bool {
        lock_or_abort(&self.state, self.name).signaled
    }

    pub fn cycle(&self) -> u64 {
        lock_or_abort(&self.state, self.name).cycle
    }

    /// Signals waiting for a cycle of their own
    pub fn queued(&self) -> u64 {
        lock_or_abort(&self.state, self.name).queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_signal_before_wait() {
        let barrier = RendezvousBarrier::new("test");
        barrier.signal();
        assert_eq!(barrier.wait(), 0);
        assert!(barrier.is_signaled());
    }

    #[test]
    fn test_wait_before_signal_releases_all_waiters() {
        let barrier = Arc::new(RendezvousBarrier::new("test"));
        let (tx, rx) = mpsc::channel();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let tx = tx.clone();
                thread::spawn(move || {
                    let cycle = barrier.wait();
                    tx.send(cycle).unwrap();
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err(), "no waiter may return before the signal");

        barrier.signal();
        for _ in 0..3 {
            assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 0);
        }
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }

    #[test]
    fn test_wait_timeout_expires_without_signal() {
        let barrier = RendezvousBarrier::new("test");
        let started = Instant::now();
        let result = barrier.wait_timeout(Some(Duration::from_millis(30)));
        assert_eq!(result, Err(WaitError::TimedOut(Duration::from_millis(30))));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_reset_rearms() {
        let barrier = RendezvousBarrier::new("test");
        barrier.signal();
        assert_eq!(barrier.reset(), 1);
        assert!(!barrier.is_signaled());
        let short = Duration::from_millis(10);
        assert_eq!(barrier.wait_timeout(Some(short)), Err(WaitError::TimedOut(short)));
    }

    #[test]
    fn test_reset_without_signal_is_noop() {
        let barrier = RendezvousBarrier::new("test");
        assert_eq!(barrier.reset(), 0);
        assert_eq!(barrier.cycle(), 0);
    }

    #[test]
    fn test_signal_during_open_cycle_is_queued() {
        let barrier = RendezvousBarrier::new("test");
        assert_eq!(barrier.signal(), 0);
        assert_eq!(barrier.signal(), 1);
        assert_eq!(barrier.queued(), 1);

        // The queued signal opens cycle 1 as soon as cycle 0 closes
        assert_eq!(barrier.reset(), 1);
        assert!(barrier.is_signaled());
        assert_eq!(barrier.queued(), 0);
        assert_eq!(barrier.wait(), 1);

        assert_eq!(barrier.reset(), 2);
        assert!(!barrier.is_signaled());
    }

    #[test]
    fn test_waiter_released_even_if_reset_wins_the_lock() {
        let barrier = Arc::new(RendezvousBarrier::new("test"));
        let (tx, rx) = mpsc::channel();
        {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || tx.send(barrier.wait()).unwrap());
        }
        thread::sleep(Duration::from_millis(50));

        // Open and close cycle 0 back to back
        barrier.signal();
        barrier.reset();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 0);
    }
}
