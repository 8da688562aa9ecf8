//! Anthropic Messages API client
//!
//! Every call streams. Deltas are forwarded as they arrive and folded into
//! the same `CompletionResponse` a caller would get from a blocking call.
//! Failures that happen before any delta was forwarded are retried with
//! exponential backoff; once text has gone out, a failure is final.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, StreamChunk, TokenUsage, ToolCall};
use crate::config::LlmConfig;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    initial_backoff: Duration,
}

impl AnthropicClient {
    /// Build a client; the API key comes from the env var the config names
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "AnthropicClient::from_config: called");
        let api_key = config.get_api_key().map_err(|e| LlmError::Config(e.to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            max_tokens: config.max_tokens,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        debug!(%model, max_tokens = request.max_tokens, "build_request_body: called");
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| serde_json::json!({"role": m.role, "content": m.content}))
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": messages,
            "stream": true,
        });

        if request.tools.is_empty() {
            return body;
        }
        let tools: Vec<Value> = request.tools.iter().map(|t| t.to_anthropic_schema()).collect();
        body["tools"] = Value::Array(tools);
        if let Some(name) = &request.tool_choice {
            body["tool_choice"] = serde_json::json!({"type": "tool", "name": name});
        }
        body
    }

    fn post(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body)
    }

    /// One streamed request; `forwarded` flips once a delta reached the caller
    async fn stream_once(
        &self,
        body: &Value,
        chunk_tx: &mpsc::Sender<StreamChunk>,
        forwarded: &mut bool,
    ) -> Result<CompletionResponse, LlmError> {
        let mut source =
            EventSource::new(self.post(&self.messages_url(), body)).map_err(|e| LlmError::Stream(e.to_string()))?;
        let mut state = StreamState::default();

        while let Some(event) = source.next().await {
            let outcome = match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => serde_json::from_str::<Value>(&message.data)
                    .map_err(LlmError::from)
                    .and_then(|data| state.apply(&data)),
                Err(e) => Err(stream_error(e).await),
            };

            match outcome {
                Ok((chunks, done)) => {
                    for chunk in chunks {
                        *forwarded = true;
                        let _ = chunk_tx.send(chunk).await;
                    }
                    if done {
                        break;
                    }
                }
                Err(e) => {
                    source.close();
                    return Err(e);
                }
            }
        }
        source.close();
        Ok(state.finish())
    }
}

/// Map an event-source failure onto the provider error it stands for
async fn stream_error(error: reqwest_eventsource::Error) -> LlmError {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) if status.as_u16() == 429 => {
            let secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            LlmError::RateLimited {
                retry_after: Duration::from_secs(secs),
            }
        }
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => LlmError::ApiError {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        },
        reqwest_eventsource::Error::Transport(e) => LlmError::Network(e),
        other => LlmError::Stream(other.to_string()),
    }
}

/// Whether a failed attempt should be repeated
fn should_retry(error: &LlmError, forwarded: bool, attempt: u32) -> bool {
    // rate limits carry their own wait; the caller decides
    !forwarded && attempt < MAX_RETRIES && error.is_retryable() && !matches!(error, LlmError::RateLimited { .. })
}

/// Accumulates server-sent events into a final response
#[derive(Debug, Default)]
struct StreamState {
    text: String,
    tool_calls: Vec<ToolCall>,
    /// (id, name, partial json) of the tool block being streamed
    open_tool: Option<(String, String, String)>,
    stop_reason: Option<StopReason>,
    usage: TokenUsage,
}

impl StreamState {
    /// Apply one event; returns text to forward and whether the message ended
    fn apply(&mut self, data: &Value) -> Result<(Vec<StreamChunk>, bool), LlmError> {
        let mut chunks = Vec::new();
        match data["type"].as_str().unwrap_or_default() {
            "message_start" => {
                self.usage.input_tokens = data["message"]["usage"]["input_tokens"].as_u64().unwrap_or(0);
            }
            "content_block_start" => {
                let block = &data["content_block"];
                if block["type"] == "tool_use" {
                    let id = block["id"].as_str().unwrap_or_default().to_string();
                    let name = block["name"].as_str().unwrap_or_default().to_string();
                    debug!(%id, %name, "StreamState::apply: tool block opened");
                    self.open_tool = Some((id, name, String::new()));
                }
            }
            "content_block_delta" => {
                let delta = &data["delta"];
                if let Some(text) = delta["text"].as_str() {
                    self.text.push_str(text);
                    chunks.push(StreamChunk::TextDelta(text.to_string()));
                }
                if let Some(fragment) = delta["partial_json"].as_str()
                    && let Some((_, _, json)) = self.open_tool.as_mut()
                {
                    json.push_str(fragment);
                }
            }
            "content_block_stop" => {
                if let Some((id, name, json)) = self.open_tool.take() {
                    // unparsable payloads stay raw for the caller's own extraction
                    let input = serde_json::from_str(&json).unwrap_or(Value::String(json));
                    self.tool_calls.push(ToolCall { id, name, input });
                }
            }
            "message_delta" => {
                if let Some(reason) = data["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(StopReason::from_anthropic(reason));
                }
                if let Some(tokens) = data["usage"]["output_tokens"].as_u64() {
                    self.usage.output_tokens = tokens;
                }
            }
            "message_stop" => return Ok((chunks, true)),
            "error" => {
                let message = data["error"]["message"].as_str().unwrap_or("stream error");
                return Err(LlmError::Stream(message.to_string()));
            }
            _ => {}
        }
        Ok((chunks, false))
    }

    fn finish(self) -> CompletionResponse {
        CompletionResponse {
            content: (!self.text.is_empty()).then_some(self.text),
            tool_calls: self.tool_calls,
            stop_reason: self.stop_reason.unwrap_or(StopReason::EndTurn),
            usage: self.usage,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn stream(&self, request: CompletionRequest, chunk_tx: mpsc::Sender<StreamChunk>) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, "AnthropicClient::stream: called");
        let body = self.build_request_body(&request);

        let mut attempt = 0;
        loop {
            let mut forwarded = false;
            let error = match self.stream_once(&body, &chunk_tx, &mut forwarded).await {
                Ok(response) => {
                    debug!(stop_reason = ?response.stop_reason, usage = ?response.usage, "stream: done");
                    return Ok(response);
                }
                Err(e) => e,
            };
            if !should_retry(&error, forwarded, attempt) {
                debug!(attempt, forwarded, error = %error, "stream: giving up");
                return Err(error);
            }

            let backoff = self.initial_backoff * 2u32.pow(attempt);
            attempt += 1;
            warn!(attempt, ?backoff, %error, "Transient provider error, retrying");
            tokio::time::sleep(backoff).await;
        }
    }
}
