//! Event Logger - persists round progress to JSONL files
//!
//! Events land in `{events_dir}/{session-id}/events.jsonl`, one line per event,
//! appended across rounds of the same session.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::Context;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use crate::cache::file_stem;
use super::types::{DxEvent, EventLogEntry};

const LOG_FILE: &str = "events.jsonl";

/// Event logger that writes events to JSONL files
pub struct EventLogger {
    events_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    pub fn new(events_dir: impl AsRef<Path>) -> Self {
        let events_dir = events_dir.as_ref().to_path_buf();
        debug!(?events_dir, "EventLogger::new: creating logger");
        Self {
            events_dir,
            writers: HashMap::new(),
        }
    }

    /// Write an event to its session's log file
    pub fn write_event(&mut self, event: &DxEvent) -> eyre::Result<()> {
        let session_id = event.session_id().to_string();
        debug!(%session_id, event_type = event.event_type(), "EventLogger::write_event");

        if !self.writers.contains_key(&session_id) {
            let session_dir = self.events_dir.join(file_stem(&session_id));
            fs::create_dir_all(&session_dir)
                .with_context(|| format!("Failed to create {}", session_dir.display()))?;

            let log_path = session_dir.join(LOG_FILE);
            debug!(?log_path, "EventLogger: opening log file");
            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(session_id.clone(), BufWriter::new(file));
        }

        let writer = self
            .writers
            .get_mut(&session_id)
            .ok_or_else(|| eyre::eyre!("No writer for session {}", session_id))?;

        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Close the writer for a session
    pub fn close_session(&mut self, session_id: &str) {
        debug!(%session_id, "EventLogger::close_session");
        if let Some(mut writer) = self.writers.remove(session_id) {
            let _ = writer.flush();
        }
    }

    /// Consume events until every sender is dropped
    pub async fn run(mut self, mut rx: broadcast::Receiver<DxEvent>) {
        debug!("EventLogger::run: starting event logger");
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let session_id = event.session_id().to_string();
                    let round_over = matches!(event, DxEvent::RoundCompleted { .. });

                    if let Err(e) = self.write_event(&event) {
                        error!(%session_id, error = %e, "EventLogger: failed to write event");
                    }

                    if round_over {
                        self.close_session(&session_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        for (session_id, mut writer) in self.writers.drain() {
            debug!(%session_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// Read back every logged event for a session
pub fn read_session_events(events_dir: impl AsRef<Path>, session_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = events_dir.as_ref().join(file_stem(session_id)).join(LOG_FILE);
    debug!(?log_path, "read_session_events: reading log file");

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

    debug!(count = entries.len(), "read_session_events: loaded entries");
    Ok(entries)
}

/// Spawn the event logger as a background task
///
/// Subscribes before returning so no event emitted afterwards is missed.
pub fn spawn_event_logger(event_bus: &EventBus, events_dir: impl AsRef<Path>) -> tokio::task::JoinHandle<()> {
    let logger = EventLogger::new(events_dir);
    let rx = event_bus.subscribe();
    tokio::spawn(logger.run(rx))
}
