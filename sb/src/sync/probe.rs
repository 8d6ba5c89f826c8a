//! DelayProbe - liveness harness for the cross-runtime waits
//!
//! A worker thread runs one fixed-length delay per request. The caller asks for
//! a delay and later blocks until every delay it asked for has finished, getting
//! back the number of completed delays. Requests made while a delay is running
//! queue behind it rather than collapsing into it.
//!
//! This exercises the same handoff the control process relies on (signal from
//! one side, block on the other) without needing a live event source.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use super::{PeriodBarrier, RendezvousBarrier, WaitError};

struct Shared {
    start: RendezvousBarrier,
    completed: PeriodBarrier,
    shutdown: AtomicBool,
    delay: Duration,
}

pub struct DelayProbe {
    shared: Arc<Shared>,
    requested: AtomicI64,
    worker: Option<JoinHandle<()>>,
}

impl DelayProbe {
    /// Spawn the worker thread
    pub fn spawn(delay: Duration) -> std::io::Result<Self> {
        debug!(?delay, "DelayProbe::spawn: called");
        let shared = Arc::new(Shared {
            start: RendezvousBarrier::new("delay-start"),
            completed: PeriodBarrier::new("delay-complete"),
            shutdown: AtomicBool::new(false),
            delay,
        });
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("delay-probe".to_string())
                .spawn(move || run_worker(&shared))?
        };
        Ok(Self {
            shared,
            requested: AtomicI64::new(0),
            worker: Some(worker),
        })
    }

    /// Request one more delay; returns immediately
    pub fn start_delay(&self) {
        let requested = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        info!(requested, "start delay");
        self.shared.start.signal();
    }

    /// Block until every requested delay has run; returns the completed count
    pub fn wait_for_delay(&self) -> i64 {
        let requested = self.requested.load(Ordering::SeqCst);
        if requested == 0 {
            return 0;
        }
        self.shared.completed.await_through(requested - 1)
    }

    pub fn wait_for_delay_timeout(&self, timeout: Option<Duration>) -> Result<i64, WaitError> {
        let requested = self.requested.load(Ordering::SeqCst);
        if requested == 0 {
            return Ok(0);
        }
        self.shared.completed.await_through_timeout(requested - 1, timeout)
    }
}

impl Drop for DelayProbe {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.start.signal();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!("DelayProbe::drop: worker stopped");
    }
}

fn run_worker(shared: &Shared) {
    debug!("delay probe worker started");
    let mut count: i64 = 0;
    loop {
        let cycle = shared.start.wait();
        if shared.shutdown.load(Ordering::SeqCst) {
            break;
        }
        thread::sleep(shared.delay);
        count += 1;
        debug!(cycle, count, "delay finished");
        shared.completed.advance(count);
        shared.start.reset();
    }
    debug!(count, "delay probe worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_single_delay_counts_one() {
        let probe = DelayProbe::spawn(Duration::from_millis(20)).unwrap();
        let started = Instant::now();
        probe.start_delay();
        assert_eq!(probe.wait_for_delay(), 1);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_without_request_returns_zero() {
        let probe = DelayProbe::spawn(Duration::from_millis(5)).unwrap();
        assert_eq!(probe.wait_for_delay(), 0);
    }

    #[test]
    fn test_back_to_back_requests_queue() {
        let probe = DelayProbe::spawn(Duration::from_millis(20)).unwrap();
        let started = Instant::now();
        probe.start_delay();
        probe.start_delay();
        probe.start_delay();
        assert_eq!(probe.wait_for_delay_timeout(Some(Duration::from_secs(5))), Ok(3));
        // Three sequential delays, none merged
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_successive_rounds() {
        let probe = DelayProbe::spawn(Duration::from_millis(5)).unwrap();
        for round in 1..=3 {
            probe.start_delay();
            assert_eq!(probe.wait_for_delay(), round);
        }
    }

    #[test]
    fn test_drop_stops_worker_mid_delay() {
        let probe = DelayProbe::spawn(Duration::from_millis(20)).unwrap();
        probe.start_delay();
        drop(probe);
    }
}
