//! The provider seam

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CompletionRequest, CompletionResponse, LlmError, StreamChunk};

/// A stateless completion provider
///
/// Planner, analysis and merge calls are independent completions; nothing is
/// shared between them except what their prompts carry.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion, forwarding text deltas to `chunk_tx` while generating
    ///
    /// A dropped receiver must not fail the call.
    async fn stream(&self, request: CompletionRequest, chunk_tx: mpsc::Sender<StreamChunk>) -> Result<CompletionResponse, LlmError>;
}
