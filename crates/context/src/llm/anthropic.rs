//! Anthropic Messages API client

use super::{LanguageModel, Prompt};
use async_trait::async_trait;
use docguard_common::config::LlmConfig;
use docguard_common::errors::{AppError, Result};
use docguard_common::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for Claude models
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let base = config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/v1/messages", base.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// History plus the final human message, with same-role runs merged
    /// since the API requires alternating roles starting with the user
    fn messages(prompt: &Prompt) -> Vec<Message> {
        let mut messages: Vec<Message> = Vec::with_capacity(prompt.history.len() + 1);
        let turns = prompt
            .history
            .iter()
            .map(|turn| (turn.role, turn.text.as_str()))
            .chain(std::iter::once((Role::Human, prompt.message.as_str())));

        for (role, text) in turns {
            let role = match role {
                Role::Human => "user",
                Role::Assistant => "assistant",
            };
            match messages.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(text);
                }
                None if role == "assistant" => continue,
                _ => messages.push(Message {
                    role,
                    content: text.to_string(),
                }),
            }
        }

        messages
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: &prompt.system,
            messages: Self::messages(prompt),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::SynthesisFailed {
                message: format!("LLM API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SynthesisFailed {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|e| AppError::SynthesisFailed {
                message: format!("Failed to parse LLM response: {}", e),
            })?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(AppError::SynthesisFailed {
                message: "Empty response from LLM".to_string(),
            });
        }

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docguard_common::ConversationTurn;

    fn prompt(history: Vec<ConversationTurn>) -> Prompt {
        Prompt {
            system: "system".to_string(),
            history,
            message: "Question: q\n\nContext:\nc\n\nAnswer:".to_string(),
            passages: vec![],
        }
    }

    #[test]
    fn test_messages_alternate() {
        let messages = AnthropicClient::messages(&prompt(vec![
            ConversationTurn::human("first"),
            ConversationTurn::assistant("reply"),
        ]));

        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert!(messages[2].content.starts_with("Question:"));
    }

    #[test]
    fn test_consecutive_human_turns_merge() {
        let messages = AnthropicClient::messages(&prompt(vec![
            ConversationTurn::assistant("orphan"),
            ConversationTurn::human("earlier question"),
        ]));

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert!(messages[0].content.starts_with("earlier question\n\nQuestion:"));
    }

    #[test]
    fn test_endpoint_from_base() {
        let config = LlmConfig {
            api_base: Some("http://localhost:9000/".to_string()),
            ..LlmConfig::default()
        };
        let client = AnthropicClient::new("key".to_string(), &config).unwrap();
        assert_eq!(client.endpoint, "http://localhost:9000/v1/messages");
    }
}
