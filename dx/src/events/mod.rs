//! Progress events for discovery rounds
//!
//! The engine writes progress into an [`EventBus`] through an [`EventEmitter`]
//! bound to the session; the CLI printer and the [`EventLogger`] read from it
//! concurrently while the round is still running.
//!
//! ```text
//!   planner ─┐
//!   executor ├─► EventEmitter ─► EventBus (broadcast) ─┬─► stderr printer
//!   synth   ─┘                                        └─► events.jsonl
//! ```

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use logger::{EventLogger, read_session_events, spawn_event_logger};
pub use types::{DxEvent, EventLogEntry, ProgressEvent, ProgressKind, ProgressLevel};
