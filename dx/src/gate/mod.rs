//! Analysis call gate
//!
//! The one seam through which every planner, analysis, and merge call
//! passes. A call takes a prompt plus the JSON shape its result must have,
//! streams zero or more partial-text chunks, and ends in exactly one
//! structured value or an error.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::EventEmitter;
use crate::llm::LlmError;

mod extract;
mod llm;

pub use extract::extract_json;
pub use llm::{LlmGate, SUBMIT_TOOL};

/// Per-call knobs forwarded to the gate
#[derive(Debug, Clone, Default)]
pub struct GateOptions {
    /// Model override; the gate's default when None
    pub model: Option<String>,
    /// Root of the project being discussed, if known
    pub working_directory: Option<PathBuf>,
    /// Upper bound on model turns spent reaching a result
    pub max_steps: u32,
}

/// One structured call
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub prompt: String,
    /// JSON schema the result must satisfy
    pub output_shape: Value,
    pub options: GateOptions,
}

/// Incremental output while a call is in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateChunk {
    PartialText(String),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("call ended before producing a result")]
    Closed,
}

/// Opaque structured-call primitive
#[async_trait]
pub trait AnalysisGate: Send + Sync {
    /// Run one call, forwarding partial text to `chunk_tx`
    ///
    /// A dropped receiver must not fail the call.
    async fn submit(&self, request: GateRequest, chunk_tx: mpsc::Sender<GateChunk>) -> Result<Value, GateError>;
}

/// Submit a call, turning its partial text into `log` progress lines for `agent`
pub async fn submit_streaming(
    gate: &dyn AnalysisGate,
    request: GateRequest,
    emitter: &EventEmitter,
    agent: &str,
) -> Result<Value, GateError> {
    let (tx, mut rx) = mpsc::channel(64);

    let forward = async {
        let mut pending = String::new();
        while let Some(GateChunk::PartialText(text)) = rx.recv().await {
            pending.push_str(&text);
            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                let line = line.trim();
                if !line.is_empty() {
                    emitter.log(Some(agent), line);
                }
            }
        }
        let rest = pending.trim();
        if !rest.is_empty() {
            emitter.log(Some(agent), rest);
        }
    };

    let (result, ()) = tokio::join!(gate.submit(request, tx), forward);
    result
}
