//! Event Bus - pub/sub for round progress
//!
//! The engine emits, the CLI printer and the JSONL logger subscribe.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::{DxEvent, ProgressEvent, ProgressKind, ProgressLevel};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4_096;

/// Central event bus for discovery rounds
pub struct EventBus {
    tx: broadcast::Sender<DxEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn emit(&self, event: DxEvent) {
        debug!(
            event_type = event.event_type(),
            session_id = event.session_id(),
            "EventBus::emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<DxEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one session
    pub fn emitter_for(&self, session_id: impl Into<String>) -> EventEmitter {
        let session_id = session_id.into();
        debug!(%session_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            session_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for components to emit events without owning the bus
///
/// Cheap to clone; every event it sends carries its session ID.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<DxEvent>,
    session_id: String,
}

impl EventEmitter {
    /// An emitter whose events go nowhere
    pub fn detached(session_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: DxEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    /// Emit a progress record for this session
    pub fn progress(&self, progress: ProgressEvent) {
        self.emit(DxEvent::Progress {
            session_id: self.session_id.clone(),
            progress,
        });
    }

    // === Convenience methods ===

    pub fn round_started(&self, round: u32, goal: &str) {
        self.emit(DxEvent::RoundStarted {
            session_id: self.session_id.clone(),
            round,
            goal: goal.to_string(),
        });
    }

    pub fn round_completed(&self, round: u32, success: bool) {
        self.emit(DxEvent::RoundCompleted {
            session_id: self.session_id.clone(),
            round,
            success,
        });
    }

    /// Round-level milestone
    pub fn status(&self, message: &str) {
        self.progress(ProgressEvent::new(ProgressKind::Status, ProgressLevel::Info, message));
    }

    /// Detail line, optionally attributed to a job
    pub fn log(&self, agent: Option<&str>, message: &str) {
        let mut event = ProgressEvent::new(ProgressKind::Log, ProgressLevel::Info, message);
        event.agent = agent.map(str::to_string);
        self.progress(event);
    }

    /// Something a job did
    pub fn agent(&self, agent: &str, message: &str) {
        self.progress(ProgressEvent::new(ProgressKind::Agent, ProgressLevel::Info, message).with_agent(agent));
    }

    /// A job attempt failed
    pub fn agent_error(&self, agent: &str, message: &str, details: &str) {
        self.progress(
            ProgressEvent::new(ProgressKind::Agent, ProgressLevel::Error, message)
                .with_agent(agent)
                .with_details(details),
        );
    }

    /// Round-level error
    pub fn error(&self, message: &str, details: &str) {
        self.progress(ProgressEvent::new(ProgressKind::Status, ProgressLevel::Error, message).with_details(details));
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers() {
        let bus = EventBus::new(16);
        bus.emit(DxEvent::RoundStarted {
            session_id: "s".to_string(),
            round: 1,
            goal: "g".to_string(),
        });
    }

    #[tokio::test]
    async fn test_emitter_tags_session() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("session-42");

        emitter.status("Planning analysis jobs");
        emitter.agent("api-survey", "Started");
        emitter.agent_error("api-survey", "Attempt 1 failed", "timeout");
        emitter.log(Some("api-survey"), "partial text");
        emitter.round_completed(1, true);

        let mut kinds = Vec::new();
        for _ in 0..5 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.session_id(), "session-42");
            if let DxEvent::Progress { progress, .. } = event {
                kinds.push((progress.kind, progress.level));
            }
        }
        assert_eq!(
            kinds,
            vec![
                (ProgressKind::Status, ProgressLevel::Info),
                (ProgressKind::Agent, ProgressLevel::Info),
                (ProgressKind::Agent, ProgressLevel::Error),
                (ProgressKind::Log, ProgressLevel::Info),
            ]
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_detached_emitter_does_not_panic() {
        let emitter = EventEmitter::detached("nowhere");
        emitter.status("ignored");
        assert_eq!(emitter.session_id(), "nowhere");
    }
}
