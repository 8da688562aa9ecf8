//! Discovery - interview round orchestrator
//!
//! Turns a product goal plus accumulated answers into one structured
//! interview round: a direction summary, inferred project context, exactly
//! three multiple-choice questions, a draft specification, and a readiness
//! score.
//!
//! # Core Concepts
//!
//! - **One gate**: every model call goes through [`gate::AnalysisGate`]
//! - **Parallel specialists**: a planner picks 2-6 analysis jobs that run concurrently
//! - **Cached profile**: the project's stack profile is reused until a change is detected
//! - **Deterministic repair**: the merged result always has three valid questions
//!
//! # Modules
//!
//! - [`engine`] - Round coordination
//! - [`signals`] - Heuristic change detection
//! - [`cache`] - Per-project profile cache
//! - [`planner`] - Job planning
//! - [`executor`] - Parallel analysis with retries
//! - [`synth`] - Merge call and result repair
//! - [`state`] - Session persistence
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`events`] - Progress event bus and logger
//! - [`cli`] - Command-line interface

pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod gate;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod signals;
pub mod state;
pub mod synth;

// Re-export commonly used types
pub use cache::{FileProfileStore, MemoryProfileStore, PROFILE_VERSION, ProfileArtifact, ProfileStore};
pub use config::{Config, DiscoveryConfig, LlmConfig, StorageConfig};
pub use domain::{
    AnalysisOutcome, AnalysisReport, Answer, DiscoverySession, InferredContext, InterviewResult, JobFailure, Question,
    SelectionMode, SpecialistJob,
};
pub use engine::{DiscoveryEngine, RoundOutcome, RoundRequest};
pub use error::DiscoveryError;
pub use events::{
    DxEvent, EventBus, EventEmitter, EventLogEntry, EventLogger, ProgressEvent, ProgressKind, ProgressLevel,
    create_event_bus, read_session_events, spawn_event_logger,
};
pub use executor::{AnalysisExecutor, PreparedJob, RetryPolicy, ensure_any_success};
pub use gate::{AnalysisGate, GateChunk, GateError, GateOptions, GateRequest, LlmGate};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use planner::{JobPlan, JobPlanner};
pub use prompts::PromptLoader;
pub use signals::{ChangeDetector, ChangeSignals};
pub use state::{FileSessionStore, MemorySessionStore, SessionStore};
pub use synth::Synthesizer;
