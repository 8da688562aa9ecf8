//! Provider clients for planner, analysis and merge calls

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, StopReason, StreamChunk, TokenUsage, ToolCall,
    ToolDefinition,
};

use crate::config::LlmConfig;

/// Build the client for `config.provider`
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    let client: Arc<dyn LlmClient> = match config.provider.as_str() {
        "anthropic" => Arc::new(AnthropicClient::from_config(config)?),
        other => return Err(LlmError::Config(format!("unsupported provider '{}' (expected anthropic)", other))),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_rejects_unknown_provider() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };

        match create_client(&config) {
            Err(LlmError::Config(msg)) => assert!(msg.contains("carrier-pigeon")),
            Err(other) => panic!("Expected config error, got {}", other),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }

    #[test]
    fn test_create_client_requires_api_key() {
        let config = LlmConfig {
            api_key_env: "DX_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };

        assert!(matches!(create_client(&config), Err(LlmError::Config(_))));
    }
}
