// Text sources module
// Turns an identifier (URL or file path) into raw text for ingestion


pub mod pdf;
pub mod web;

pub use web::UrlTextSource;

use anyhow::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source not found: {0}")]
    NotFound(String),
    #[error("Unsupported source type: {0}")]
    Unsupported(String),
    #[error("Network error fetching {identifier}: {message}")]
    Network { identifier: String, message: String },
}

/// Text acquisition collaborator
pub trait TextSource: Send {
    fn fetch(&self, identifier: &str) -> Result<String>;
}

/// `http://` and `https://` identifiers are fetched over the network
#[inline]
pub fn is_url(identifier: &str) -> bool {
    let lower = identifier.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Reads local files: PDFs through their text layer, anything else as UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTextSource;

impl TextSource for FileTextSource {
    #[inline]
    fn fetch(&self, identifier: &str) -> Result<String> {
        let path = Path::new(identifier);
        if pdf::is_pdf(path) {
            return pdf::extract_pdf_text(path);
        }

        match fs::read_to_string(path) {
            Ok(text) => {
                debug!("Read {} bytes from {}", text.len(), identifier);
                Ok(text)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SourceError::NotFound(identifier.to_string()).into())
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(SourceError::Unsupported(
                format!("{} is not valid UTF-8 text", identifier),
            )
            .into()),
            Err(e) => Err(anyhow::Error::from(e).context(format!("Failed to read {}", identifier))),
        }
    }
}

/// Dispatches URLs to the web source and everything else to the file source
#[derive(Debug, Clone)]
pub struct SourceRouter {
    web: UrlTextSource,
    file: FileTextSource,
}

impl SourceRouter {
    #[inline]
    pub const fn new(web: UrlTextSource) -> Self {
        Self {
            web,
            file: FileTextSource,
        }
    }
}

impl Default for SourceRouter {
    #[inline]
    fn default() -> Self {
        Self::new(UrlTextSource::default())
    }
}

impl TextSource for SourceRouter {
    #[inline]
    fn fetch(&self, identifier: &str) -> Result<String> {
        if is_url(identifier) {
            self.web.fetch(identifier.trim())
        } else {
            self.file.fetch(identifier)
        }
    }
}
