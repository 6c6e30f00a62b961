#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{AnswerGenerator, ContextPassage, SYSTEM_PROMPT, build_prompt};
use crate::config::GenerationConfig;
use crate::embeddings::openai::endpoint_url;
use crate::http::{self, RetryPolicy};

/// Client for OpenAI-compatible chat completion APIs (OpenAI, Groq, ...)
#[derive(Debug, Clone)]
pub struct ChatCompletionGenerator {
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// The subset of a chat completion response that carries the answer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatCompletionGenerator {
    #[inline]
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint_url(&config.base_url, "chat/completions")?,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            agent: http::build_agent(Duration::from_secs(config.timeout_seconds)),
            retry: RetryPolicy::default(),
        })
    }

    #[inline]
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl AnswerGenerator for ChatCompletionGenerator {
    #[inline]
    fn generate(&self, query: &str, passages: &[ContextPassage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(build_prompt(query, passages)),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;
        let authorization = format!("Bearer {}", self.api_key);

        debug!(
            "Requesting answer from {} with {} passages",
            self.model,
            passages.len()
        );

        let response_text = http::request_with_retry(&self.retry, self.endpoint.as_str(), || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &authorization)
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Chat completion request failed")?;

        let response: ChatCompletionResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat completion response")?;
        answer_from_response(response)
    }
}

/// The answer is the first choice's message content; anything else is an error
#[inline]
pub fn answer_from_response(response: ChatCompletionResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Chat completion returned no choices"))?;

    let content = choice.message.content.unwrap_or_default();
    let answer = content.trim();
    if answer.is_empty() {
        return Err(anyhow!(
            "Chat completion returned an empty answer (finish reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        ));
    }
    Ok(answer.to_string())
}
