//! Wire-neutral request and response types
//!
//! Shaped after the Messages API, trimmed to what single structured calls
//! and the gate's nudge loop need.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Overrides the client's configured model
    pub model: Option<String>,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// When set, the model must answer by calling this tool
    pub tool_choice: Option<String>,
    /// Capped by the client's configured maximum
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, text)
    }

    fn with_role(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Concatenated text blocks; None when the model only called tools
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Input of the first call to `name`
    pub fn tool_input(&self, name: &str) -> Option<&Value> {
        self.tool_calls.iter().find(|c| c.name == name).map(|c| &c.input)
    }
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments, or the raw text when the streamed JSON was broken
    pub input: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Unknown reasons read as a normal end of turn
    pub fn from_anthropic(reason: &str) -> Self {
        match reason {
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            _ => Self::EndTurn,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    pub fn to_anthropic_schema(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema,
        })
    }
}

/// Delta forwarded to a streaming caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    TextDelta(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("hi").role, Role::User);
        let reply = Message::assistant("ok");
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(serde_json::to_value(&reply).unwrap()["role"], "assistant");
    }

    #[test]
    fn test_stop_reason_from_anthropic() {
        let cases = [
            ("end_turn", StopReason::EndTurn),
            ("tool_use", StopReason::ToolUse),
            ("max_tokens", StopReason::MaxTokens),
            ("stop_sequence", StopReason::StopSequence),
            ("pause_turn", StopReason::EndTurn),
        ];
        for (raw, expected) in cases {
            assert_eq!(StopReason::from_anthropic(raw), expected, "{}", raw);
        }
    }

    #[test]
    fn test_tool_input_finds_first_matching_call() {
        let call = |id: &str, name: &str, n: i64| ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input: serde_json::json!({ "n": n }),
        };
        let response = CompletionResponse {
            content: None,
            tool_calls: vec![call("a", "lookup", 1), call("b", "submit_result", 2), call("c", "submit_result", 3)],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        };

        assert_eq!(response.tool_input("submit_result").unwrap()["n"], 2);
        assert!(response.tool_input("missing").is_none());
    }

    #[test]
    fn test_tool_definition_schema_shape() {
        let schema = ToolDefinition::new("submit_result", "Submit", serde_json::json!({"type": "object"})).to_anthropic_schema();
        assert_eq!(schema["name"], "submit_result");
        assert_eq!(schema["input_schema"]["type"], "object");
    }
}
