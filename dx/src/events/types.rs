//! Event types for discovery round streaming
//!
//! `ProgressEvent` is the wire record a caller renders while a round runs.
//! `DxEvent` wraps it with the session it belongs to, plus round lifecycle
//! markers the logger uses to close files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a progress event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    /// Round-level milestone (planning, synthesis)
    Status,
    /// Free-form detail, including partial analysis text
    Log,
    /// Something a single analysis job did
    Agent,
}

/// Severity of a progress event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressLevel {
    Info,
    Error,
}

/// One progress record as streamed to the caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub level: ProgressLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, level: ProgressLevel, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
            agent: None,
            details: None,
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Everything that travels over the event bus
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DxEvent {
    /// A round has begun for a session
    RoundStarted { session_id: String, round: u32, goal: String },
    /// Progress within a running round
    Progress { session_id: String, progress: ProgressEvent },
    /// A round ended; `success` is false when it failed fatally
    RoundCompleted { session_id: String, round: u32, success: bool },
}

impl DxEvent {
    /// Get the session ID for this event
    pub fn session_id(&self) -> &str {
        match self {
            DxEvent::RoundStarted { session_id, .. }
            | DxEvent::Progress { session_id, .. }
            | DxEvent::RoundCompleted { session_id, .. } => session_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            DxEvent::RoundStarted { .. } => "RoundStarted",
            DxEvent::Progress { .. } => "Progress",
            DxEvent::RoundCompleted { .. } => "RoundCompleted",
        }
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: DxEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: DxEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
