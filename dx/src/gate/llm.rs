//! Gate backed by an LlmClient
//!
//! The output shape becomes the input schema of a single forced tool, so the
//! structured result arrives as the tool call's input. Text replies are run
//! through the extraction fallbacks instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{AnalysisGate, GateChunk, GateError, GateOptions, GateRequest, extract_json};
use crate::llm::{CompletionRequest, LlmClient, Message, StopReason, StreamChunk, ToolDefinition};

/// Name of the tool the model must call with its result
pub const SUBMIT_TOOL: &str = "submit_result";

const NUDGE: &str = "Call submit_result now with the complete result. Do not reply with prose.";

pub struct LlmGate {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmGate {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }

    fn system_prompt(options: &GateOptions) -> String {
        let mut prompt = String::from(
            "You are a senior product and engineering analyst. \
             Return your answer only by calling the submit_result tool.",
        );
        if let Some(dir) = &options.working_directory {
            prompt.push_str(&format!("\nThe project under discussion lives at {}.", dir.display()));
        }
        prompt
    }

    /// One streamed completion, forwarding text deltas as partial text
    async fn step(
        &self,
        request: CompletionRequest,
        chunk_tx: &mpsc::Sender<GateChunk>,
    ) -> Result<crate::llm::CompletionResponse, GateError> {
        let (tx, mut rx) = mpsc::channel::<StreamChunk>(64);

        let forward = async {
            while let Some(chunk) = rx.recv().await {
                let StreamChunk::TextDelta(text) = chunk;
                // A caller that stopped listening does not fail the call
                let _ = chunk_tx.send(GateChunk::PartialText(text)).await;
            }
        };

        let (response, ()) = tokio::join!(self.client.stream(request, tx), forward);
        Ok(response?)
    }
}

#[async_trait]
impl AnalysisGate for LlmGate {
    async fn submit(&self, request: GateRequest, chunk_tx: mpsc::Sender<GateChunk>) -> Result<Value, GateError> {
        let steps = request.options.max_steps.max(1);
        debug!(prompt_len = request.prompt.len(), steps, "LlmGate::submit: called");

        let tool = ToolDefinition::new(SUBMIT_TOOL, "Submit the final structured result", request.output_shape);
        let system_prompt = Self::system_prompt(&request.options);
        let mut messages = vec![Message::user(request.prompt)];

        for step in 1..=steps {
            let completion = CompletionRequest {
                model: request.options.model.clone(),
                system_prompt: system_prompt.clone(),
                messages: messages.clone(),
                tools: vec![tool.clone()],
                tool_choice: Some(SUBMIT_TOOL.to_string()),
                max_tokens: self.max_tokens,
            };

            let response = self.step(completion, &chunk_tx).await?;
            debug!(step, stop_reason = ?response.stop_reason, tools = response.tool_calls.len(), "LlmGate::submit: step done");

            match response.tool_input(SUBMIT_TOOL) {
                Some(Value::String(raw)) => {
                    if let Some(value) = extract_json(raw) {
                        return Ok(value);
                    }
                    warn!(step, "LlmGate::submit: tool input was not JSON");
                }
                Some(value) => return Ok(value.clone()),
                None => {}
            }

            let text = response.content.unwrap_or_default();
            if let Some(value) = extract_json(&text) {
                return Ok(value);
            }

            if response.stop_reason == StopReason::MaxTokens {
                return Err(GateError::Closed);
            }

            let said = if text.trim().is_empty() { "(no output)".to_string() } else { text };
            messages.push(Message::assistant(said));
            messages.push(Message::user(NUDGE));
        }

        Err(GateError::InvalidOutput(format!(
            "no structured output after {} step(s)",
            steps
        )))
    }
}
