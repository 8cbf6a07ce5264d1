//! ============================================================================
//! Chat Completion Client - Language model calls via an OpenAI-compatible API
//! ============================================================================
//! Sends (instructions, context, user message) as a system + user message
//! pair and asks for a JSON object reply.
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CopilotConfig;
use crate::retrieval::embeddings::build_client;
use crate::types::CopilotError;

/// Everything the model sees for one answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPrompt {
    pub instructions: String,
    pub context: String,
    pub user_message: String,
}

/// Prompt → text capability
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &CompletionPrompt) -> Result<String>;
}

/// Client for `/chat/completions`
pub struct ChatCompletionClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build from configuration, bounding every request by the upstream timeout
    pub fn from_config(config: &CopilotConfig) -> Result<Self, CopilotError> {
        let api_key = config.require_api_key()?.to_string();
        let client = build_client(config.upstream_timeout)
            .map_err(|e| CopilotError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.openai_base_url.clone(),
            model: config.chat_model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &CompletionPrompt) -> ChatRequest {
        let system = if prompt.context.is_empty() {
            prompt.instructions.clone()
        } else {
            format!("{}\n\n{}", prompt.instructions, prompt.context)
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user_message.clone(),
                },
            ],
            temperature: Some(0.2),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl CompletionModel for ChatCompletionClient {
    async fn complete(&self, prompt: &CompletionPrompt) -> Result<String> {
        debug!(
            "Calling chat completions ({}) with {} context chars",
            self.model,
            prompt.context.len()
        );

        let request = self.build_request(prompt);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call chat completions API: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat completions API error {}: {}", status, body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse API response: {}", e))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No response from API"))
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(context: &str) -> CompletionPrompt {
        CompletionPrompt {
            instructions: "Answer from the sources.".to_string(),
            context: context.to_string(),
            user_message: "How do I configure SSO?".to_string(),
        }
    }

    #[test]
    fn test_request_shape() {
        let client = ChatCompletionClient::new(
            "key".to_string(),
            "https://api.openai.com/v1".to_string(),
            "gpt-4o-mini".to_string(),
        );
        let json = serde_json::to_value(client.build_request(&prompt("<sources>x</sources>"))).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json["messages"][0]["content"]
            .as_str()
            .unwrap()
            .ends_with("<sources>x</sources>"));
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "How do I configure SSO?");
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_empty_context_keeps_instructions_only() {
        let client = ChatCompletionClient::new("k".into(), "u".into(), "m".into());
        let json = serde_json::to_value(client.build_request(&prompt(""))).unwrap();
        assert_eq!(json["messages"][0]["content"], "Answer from the sources.");
    }

    #[test]
    fn test_response_parsing_tolerates_null_content() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
