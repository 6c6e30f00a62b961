// Answer generation module
// Composes a grounded answer from retrieved passages


pub mod chat;

pub use chat::ChatCompletionGenerator;

use std::fmt::Write as _;

use crate::config::{GenerationBackend, GenerationConfig};
use crate::{RagError, Result};

/// A retrieved passage and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPassage {
    pub text: String,
    pub source: String,
}

/// Answer generation collaborator
pub trait AnswerGenerator: Send {
    fn generate(&self, query: &str, passages: &[ContextPassage]) -> anyhow::Result<String>;
}

/// Answers with the passages themselves; used when no language model is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextOnlyGenerator;

impl AnswerGenerator for ContextOnlyGenerator {
    #[inline]
    fn generate(&self, _query: &str, passages: &[ContextPassage]) -> anyhow::Result<String> {
        Ok(join_passages(passages))
    }
}

/// Passage texts separated by blank lines
#[inline]
pub fn join_passages(passages: &[ContextPassage]) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Use only the context below to answer \
the question, and cite the sources. If the context does not contain the answer, say so.";

/// User prompt listing each passage under its source label, followed by the question
#[inline]
pub fn build_prompt(query: &str, passages: &[ContextPassage]) -> String {
    let mut prompt = String::from("CONTEXT:\n");
    for (i, passage) in passages.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] (source: {})", i + 1, passage.source);
        prompt.push_str(&passage.text);
        prompt.push_str("\n\n");
    }
    let _ = write!(
        prompt,
        "QUESTION:\n{}\n\nAnswer concisely and mention sources.",
        query
    );
    prompt
}

/// Build the generator selected by configuration
#[inline]
pub fn build_generator(config: &GenerationConfig) -> Result<Box<dyn AnswerGenerator>> {
    match config.backend {
        GenerationBackend::Disabled => Ok(Box::new(ContextOnlyGenerator)),
        GenerationBackend::OpenAi => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                RagError::Config(format!(
                    "Chat completion backend selected but {} is not set",
                    config.api_key_env
                ))
            })?;
            let generator = ChatCompletionGenerator::new(config, api_key)
                .map_err(|e| RagError::Config(format!("{:#}", e)))?;
            Ok(Box::new(generator))
        }
    }
}
