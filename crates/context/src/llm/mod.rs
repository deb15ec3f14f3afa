//! Language model clients
//!
//! - `AnthropicClient`: Anthropic Messages API
//! - `OfflineModel`: extractive answers built from the top passage, used
//!   when no API key is configured

mod anthropic;
mod offline;

pub use anthropic::AnthropicClient;
pub use offline::OfflineModel;

use async_trait::async_trait;
use docguard_common::config::LlmConfig;
use docguard_common::errors::{AppError, Result};
use docguard_common::{ConversationTurn, RetrievedPassage};
use std::sync::Arc;

/// Everything a model sees for one question
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Fixed system instruction
    pub system: String,
    /// Earlier turns of the conversation, oldest first
    pub history: Vec<ConversationTurn>,
    /// Final human message: question plus formatted context
    pub message: String,
    /// Passages the context was built from
    pub passages: Vec<RetrievedPassage>,
}

/// A chat-style text generator
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce an answer for the prompt
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Model identifier, used in metrics and logs
    fn model_name(&self) -> &str;
}

/// Create a language model based on configuration
pub fn create_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "anthropic" => match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Ok(Arc::new(AnthropicClient::new(key.to_string(), config)?)),
            None => {
                tracing::warn!("No LLM API key configured, answering with the offline model");
                Ok(Arc::new(OfflineModel::new()))
            }
        },
        "offline" => Ok(Arc::new(OfflineModel::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown LLM provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_uses_offline_model() {
        let model = create_language_model(&LlmConfig::default()).unwrap();
        assert_eq!(model.model_name(), offline::OFFLINE_MODEL_NAME);
    }

    #[test]
    fn test_key_selects_anthropic() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let model = create_language_model(&config).unwrap();
        assert_eq!(model.model_name(), config.model);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "cohere".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_language_model(&config),
            Err(AppError::Configuration { .. })
        ));
    }
}
