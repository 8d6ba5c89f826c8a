//! MessageExchange - period-keyed message store with exactly-once drain

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Envelope, PeriodBucket, PeriodIndex, PutResult};
use crate::events::EventEmitter;
use crate::sync::lock_or_abort;

/// Why an inbound message was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The period is older than the retention window
    Evicted,
    /// The period was already handed to the consumer
    AlreadyDrained,
}

/// What `ingest` did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First value of a singleton type in its period
    Stored,
    /// Added to a repeating type's list
    Appended,
    /// Replaced an earlier singleton value in the same period
    Overwrote,
    /// Not stored
    Dropped(DropReason),
}

/// Counters since the exchange was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExchangeStats {
    pub ingested: u64,
    pub overwritten: u64,
    /// Messages refused at ingest plus messages evicted before anyone took them
    pub dropped: u64,
    /// Drains that handed out at least one message
    pub drained: u64,
    /// Buckets removed by the retention window
    pub evicted: u64,
    pub live_buckets: usize,
}

#[derive(Debug)]
struct Inner {
    buckets: BTreeMap<PeriodIndex, PeriodBucket>,
    /// Drained periods still inside the retention window
    drained: BTreeSet<PeriodIndex>,
    /// Periods below this have been evicted
    horizon: PeriodIndex,
    stats: ExchangeStats,
}

/// Store of inbound messages keyed by the period they belong to
///
/// Any number of producer threads may `ingest` concurrently; one consumer
/// thread calls `drain` once per period. Every mutation happens under a single
/// short critical section, and events are emitted only after it ends.
#[derive(Debug)]
pub struct MessageExchange {
    retention: PeriodIndex,
    inner: Mutex<Inner>,
    events: EventEmitter,
}

impl MessageExchange {
    /// Create an exchange that keeps `retention` periods behind the last drain
    pub fn new(retention: PeriodIndex, events: EventEmitter) -> Self {
        debug!(retention, "MessageExchange::new: called");
        Self {
            retention: retention.max(0),
            inner: Mutex::new(Inner {
                buckets: BTreeMap::new(),
                drained: BTreeSet::new(),
                horizon: PeriodIndex::MIN,
                stats: ExchangeStats::default(),
            }),
            events,
        }
    }

    pub fn retention(&self) -> PeriodIndex {
        self.retention
    }

    /// Store a message under `period`; never blocks beyond the store lock
    ///
    /// Singleton types overwrite (with a warning), repeating types append.
    /// Messages for an evicted or already drained period are logged and
    /// dropped.
    pub fn ingest(&self, period: PeriodIndex, envelope: Envelope) -> IngestOutcome {
        let message_type = envelope.message_type.clone();

        let outcome = {
            let mut inner = lock_or_abort(&self.inner, "exchange");
            if period < inner.horizon {
                inner.stats.dropped += 1;
                IngestOutcome::Dropped(DropReason::Evicted)
            } else if inner.drained.contains(&period) {
                inner.stats.dropped += 1;
                IngestOutcome::Dropped(DropReason::AlreadyDrained)
            } else {
                inner.stats.ingested += 1;
                match inner.buckets.entry(period).or_default().put(envelope) {
                    PutResult::Stored => IngestOutcome::Stored,
                    PutResult::Appended => IngestOutcome::Appended,
                    PutResult::Replaced(_) => {
                        inner.stats.overwritten += 1;
                        IngestOutcome::Overwrote
                    }
                }
            }
        };

        match outcome {
            IngestOutcome::Overwrote => {
                warn!(period, %message_type, "ingest: singleton overwritten, keeping latest");
                self.events.singleton_overwritten(period, &message_type);
            }
            IngestOutcome::Dropped(reason) => {
                warn!(period, %message_type, ?reason, "ingest: late message dropped");
                self.events.message_dropped(period, &message_type, reason);
            }
            IngestOutcome::Stored | IngestOutcome::Appended => {
                debug!(period, %message_type, "ingest: stored");
            }
        }
        outcome
    }

    /// Take everything stored for `period`
    ///
    /// A second drain of the same period returns an empty bucket. Afterwards,
    /// buckets older than `period - retention` are evicted; the returned period
    /// and later ones are never touched. Messages in an evicted bucket were
    /// never handed out, so each one is reported as dropped.
    pub fn drain(&self, period: PeriodIndex) -> PeriodBucket {
        let (bucket, stale) = {
            let mut inner = lock_or_abort(&self.inner, "exchange");
            let bucket = inner.buckets.remove(&period).unwrap_or_default();
            if period >= inner.horizon {
                inner.drained.insert(period);
            }
            if !bucket.is_empty() {
                inner.stats.drained += 1;
            }

            let horizon = period.saturating_sub(self.retention);
            let stale = if horizon > inner.horizon {
                inner.horizon = horizon;
                let kept = inner.buckets.split_off(&horizon);
                let stale = std::mem::replace(&mut inner.buckets, kept);
                let kept_drained = inner.drained.split_off(&horizon);
                inner.drained = kept_drained;
                stale
            } else {
                BTreeMap::new()
            };
            inner.stats.evicted += stale.len() as u64;
            inner.stats.dropped += stale.values().map(PeriodBucket::message_count).sum::<usize>() as u64;
            inner.stats.live_buckets = inner.buckets.len();
            (bucket, stale)
        };

        for (stale_period, stale_bucket) in &stale {
            for (message_type, slot) in stale_bucket.iter() {
                warn!(
                    period = *stale_period,
                    %message_type,
                    messages = slot.len(),
                    "drain: evicting messages that were never taken"
                );
                self.events.message_dropped(*stale_period, message_type, DropReason::Evicted);
            }
        }

        info!(
            period,
            types = bucket.type_count(),
            messages = bucket.message_count(),
            evicted = stale.len(),
            "drain: returning period messages"
        );
        self.events.messages_taken(period, bucket.message_count(), stale.len());
        bucket
    }

    /// Periods that currently hold undrained messages
    pub fn pending_periods(&self) -> Vec<PeriodIndex> {
        lock_or_abort(&self.inner, "exchange").buckets.keys().copied().collect()
    }

    pub fn stats(&self) -> ExchangeStats {
        let inner = lock_or_abort(&self.inner, "exchange");
        ExchangeStats {
            live_buckets: inner.buckets.len(),
            ..inner.stats.clone()
        }
    }
}
