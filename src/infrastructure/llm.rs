use crate::config::LlmEnvConfig;
use crate::domain::errors::GenerationError;
use crate::domain::ports::{GenerationConstraints, TextGenerationService};
use crate::infrastructure::http_client_factory::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Chat-completions client for any OpenAI-compatible endpoint
pub struct OpenAiCompatibleClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    /// Fails with [`GenerationError::Unavailable`] when no API key is set
    pub fn from_config(config: &LlmEnvConfig, timeout: Duration) -> Result<Self, GenerationError> {
        let api_key = config.api_key.clone().ok_or(GenerationError::Unavailable)?;
        Ok(Self {
            client: HttpClientFactory::create_client_with_retries(timeout, 2),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerationService for OpenAiCompatibleClient {
    async fn propose(&self, prompt: &str, constraints: &GenerationConstraints) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &constraints.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: constraints.max_tokens,
            temperature: constraints.temperature,
        };

        let payload = serde_json::to_vec(&request).context("Failed to encode chat request")?;
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .context("Chat completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Request {
                reason: format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .context("Failed to read chat completion body")?;
        let reply = extract_reply(&body)?;
        debug!("LLM: {} replied {:?}", self.model, reply);
        Ok(reply)
    }
}

fn extract_reply(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| GenerationError::Malformed {
        reason: e.to_string(),
    })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(GenerationError::Malformed {
            reason: "no choices in reply".to_string(),
        })
}
