//! Blocking synchronization primitives
//!
//! Both barriers are a `std::sync::Mutex` guarding a small state struct plus a
//! `Condvar`, with the wake predicate re-checked in a loop. They are meant to be
//! called from plain OS threads: producers signal from whatever thread the event
//! source delivers on, the single consumer blocks.
//!
//! A poisoned lock means a thread panicked mid-update. A waiter can no longer
//! tell whether it missed its signal, and the event stream cannot be replayed,
//! so the process aborts.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tracing::error;

mod period;
mod probe;
mod rendezvous;

pub use period::PeriodBarrier;
pub use probe::DelayProbe;
pub use rendezvous::RendezvousBarrier;

/// Errors from bounded waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("Timed out after {0:?}")]
    TimedOut(Duration),
}

/// Log and abort; a poisoned barrier leaves waiters unable to trust what they observe
pub(crate) fn abort_poisoned(what: &str) -> ! {
    error!(%what, "lock poisoned, state can no longer be trusted; aborting");
    std::process::abort()
}

pub(crate) fn lock_or_abort<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => abort_poisoned(what),
    }
}

/// Block on `cond` while `blocked` holds, optionally bounded by `timeout`
pub(crate) fn wait_while<'a, T, F>(
    cond: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Option<Duration>,
    what: &str,
    blocked: F,
) -> Result<MutexGuard<'a, T>, WaitError>
where
    F: FnMut(&mut T) -> bool,
{
    match timeout {
        None => match cond.wait_while(guard, blocked) {
            Ok(guard) => Ok(guard),
            Err(_) => abort_poisoned(what),
        },
        Some(limit) => match cond.wait_timeout_while(guard, limit, blocked) {
            Ok((_, result)) if result.timed_out() => Err(WaitError::TimedOut(limit)),
            Ok((guard, _)) => Ok(guard),
            Err(_) => abort_poisoned(what),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_while_returns_immediately_when_not_blocked() {
        let mutex = Mutex::new(true);
        let cond = Condvar::new();
        let guard = lock_or_abort(&mutex, "test");
        let guard = wait_while(&cond, guard, None, "test", |ready| !*ready).unwrap();
        assert!(*guard);
    }

    #[test]
    fn test_wait_while_times_out() {
        let mutex = Mutex::new(false);
        let cond = Condvar::new();
        let guard = lock_or_abort(&mutex, "test");
        let result = wait_while(&cond, guard, Some(Duration::from_millis(20)), "test", |ready| !*ready);
        assert_eq!(result.err(), Some(WaitError::TimedOut(Duration::from_millis(20))));
    }
}
