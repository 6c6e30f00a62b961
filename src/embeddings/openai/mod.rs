
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::http::{self, RetryPolicy};

/// Client for any service exposing the OpenAI `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    endpoint: Url,
    api_key: String,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let endpoint = endpoint_url(&config.openai.base_url, "embeddings")?;

        Ok(Self {
            endpoint,
            api_key,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            agent: http::build_agent(Duration::from_secs(http::DEFAULT_TIMEOUT_SECONDS)),
            retry: RetryPolicy::default(),
        })
    }

    #[inline]
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;
        let authorization = format!("Bearer {}", self.api_key);

        let response_text = http::request_with_retry(&self.retry, self.endpoint.as_str(), || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &authorization)
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to generate embeddings")?;

        let response: EmbeddingsResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        order_by_index(response.data, texts.len())
    }
}

impl Embedder for OpenAiEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} embeddings from {}", texts.len(), self.endpoint);

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            embeddings.extend(
                self.embed_single_batch(batch)
                    .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?,
            );
        }
        Ok(embeddings)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }
}

/// Join `path` onto an API base such as `https://api.openai.com/v1`
#[inline]
pub fn endpoint_url(base_url: &str, path: &str) -> Result<Url> {
    let mut base = base_url.trim_end_matches('/').to_string();
    base.push('/');
    Url::parse(&base)
        .and_then(|url| url.join(path))
        .with_context(|| format!("Invalid API base URL: {}", base_url))
}

/// Responses may list items out of order; each carries the input position it belongs to
fn order_by_index(data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(anyhow!(
            "Mismatch between request and response counts: {} vs {}",
            expected,
            data.len()
        ));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        let slot = slots
            .get_mut(item.index)
            .ok_or_else(|| anyhow!("Response index {} out of range", item.index))?;
        if slot.replace(item.embedding).is_some() {
            return Err(anyhow!("Duplicate response index {}", item.index));
        }
    }

    // Every slot is filled: counts match and no index repeats
    Ok(slots.into_iter().flatten().collect())
}
