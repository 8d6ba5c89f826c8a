//! Event Journal - persists bridge events to JSONL files
//!
//! Subscribes to the EventBus and appends every event to
//! `<journal-dir>/<session-id>/events.jsonl`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{BridgeEvent, EventLogEntry};

/// Journal that writes events to per-session JSONL files
pub struct EventJournal {
    journal_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventJournal {
    pub fn new(journal_dir: impl AsRef<Path>) -> Self {
        let journal_dir = journal_dir.as_ref().to_path_buf();
        debug!(?journal_dir, "EventJournal::new: creating journal");
        Self {
            journal_dir,
            writers: HashMap::new(),
        }
    }

    /// Append an event to its session's file
    pub fn write_event(&mut self, event: &BridgeEvent) -> eyre::Result<()> {
        let session_id = event.session_id();

        if !self.writers.contains_key(session_id) {
            let session_dir = self.journal_dir.join(session_id);
            fs::create_dir_all(&session_dir)?;

            let log_path = session_dir.join("events.jsonl");
            debug!(?log_path, "EventJournal: creating new journal file");

            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(session_id.to_string(), BufWriter::new(file));
        }

        let Some(writer) = self.writers.get_mut(session_id) else {
            return Err(eyre::eyre!("No journal writer for session {}", session_id));
        };

        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Flush and drop the writer for a session
    pub fn close_session(&mut self, session_id: &str) {
        debug!(%session_id, "EventJournal::close_session");
        if let Some(mut writer) = self.writers.remove(session_id) {
            let _ = writer.flush();
        }
    }

    /// Consume events from the bus until the channel closes
    ///
    /// The receiver is taken by the caller so that no event emitted between
    /// spawning and the first poll is missed.
    pub async fn run(mut self, mut rx: broadcast::Receiver<BridgeEvent>) {
        debug!("EventJournal::run: starting");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let session_id = event.session_id().to_string();
                    let is_session_end = matches!(event, BridgeEvent::SessionEnded { .. });

                    if let Err(e) = self.write_event(&event) {
                        error!(%session_id, error = %e, "EventJournal: failed to write event");
                    }

                    if is_session_end {
                        self.close_session(&session_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventJournal: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventJournal: channel closed, shutting down");
                    break;
                }
            }
        }

        for (session_id, mut writer) in self.writers.drain() {
            debug!(%session_id, "EventJournal: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// Read back the journal of one session
pub fn read_session_events(journal_dir: impl AsRef<Path>, session_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = journal_dir.as_ref().join(session_id).join("events.jsonl");
    debug!(?log_path, "read_session_events: reading journal");

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_session_events: failed to parse line");
            }
        }
    }

    Ok(entries)
}

/// Spawn the journal as a background task
pub fn spawn_event_journal(event_bus: Arc<EventBus>, journal_dir: impl AsRef<Path>) -> eyre::Result<tokio::task::JoinHandle<()>> {
    fs::create_dir_all(journal_dir.as_ref())?;
    let journal = EventJournal::new(journal_dir);
    let rx = event_bus.subscribe();
    Ok(tokio::spawn(journal.run(rx)))
}
