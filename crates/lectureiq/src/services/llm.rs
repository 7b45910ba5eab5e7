use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::services::ServiceError;

#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A text-completion backend.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError>;
}

/// Client for OpenAI-compatible chat-completion endpoints (Groq by default).
pub struct ChatClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .api_key
            .resolve()?
            .ok_or(ServiceError::NotConfigured {
                service: "text generation",
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::LanguageModel(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl LanguageModel for ChatClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ServiceError::LanguageModel(e.without_url().to_string()))?;

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ServiceError::LanguageModel(format!("malformed response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::LanguageModel("response had no choices".to_string()))?;

        Ok(content.trim().to_string())
    }
}
