#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

use super::{SourceError, TextSource};
use crate::http::{self, RequestError, RetryPolicy};

const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Elements whose text never belongs to the readable page
const UNWANTED_ELEMENTS: &str = "script, style, noscript";

/// Fetches a web page and reduces it to its visible text
#[derive(Debug, Clone)]
pub struct UrlTextSource {
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl Default for UrlTextSource {
    #[inline]
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS))
    }
}

impl UrlTextSource {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: http::build_agent(timeout),
            retry: RetryPolicy::default(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl TextSource for UrlTextSource {
    #[inline]
    fn fetch(&self, identifier: &str) -> Result<String> {
        let url = url::Url::parse(identifier)
            .with_context(|| format!("Invalid URL format: {}", identifier))?;

        let html = http::request_with_retry(&self.retry, url.as_str(), || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|e| match e {
            RequestError::Status {
                status: 404 | 410, ..
            } => {
                anyhow::Error::from(SourceError::NotFound(identifier.to_string()))
            }
            other => anyhow::Error::from(SourceError::Network {
                identifier: identifier.to_string(),
                message: other.to_string(),
            }),
        })?;

        debug!("Fetched {} bytes of HTML from {}", html.len(), identifier);
        extract_text(&html)
    }
}

/// Visible text of an HTML document: one trimmed, non-empty line per text
/// line, with script, style and noscript content removed
#[inline]
pub fn extract_text(html: &str) -> Result<String> {
    let mut document = Html::parse_document(html);
    let unwanted = Selector::parse(UNWANTED_ELEMENTS)
        .map_err(|e| anyhow!("Invalid selector '{}': {}", UNWANTED_ELEMENTS, e))?;

    // Collect ids first; detaching while iterating would invalidate the selection
    let unwanted_node_ids: Vec<_> = document.select(&unwanted).map(|el| el.id()).collect();
    for node_id in unwanted_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }

    let mut raw = String::new();
    for text in document.root_element().text() {
        raw.push_str(text);
        raw.push('\n');
    }

    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    Ok(lines.join("\n"))
}
