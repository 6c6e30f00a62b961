#[cfg(test)]
pub(crate) mod tests;

use anyhow::Result;
use std::path::Path;
use tracing::{debug, warn};

use super::SourceError;

/// Identifiers ending in `.pdf` (any case) are read as PDF documents
#[inline]
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Text of every page, in page order.
///
/// Pages without a text layer (scanned images) contribute nothing, so an
/// image-only document yields blank text rather than an error.
#[inline]
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.display().to_string()).into());
    }

    let text = pdf_extract::extract_text(path).map_err(|e| {
        SourceError::Unsupported(format!("{} is not a readable PDF: {}", path.display(), e))
    })?;

    if text.trim().is_empty() {
        warn!("No text layer found in {}", path.display());
    } else {
        debug!("Extracted {} bytes of text from {}", text.len(), path.display());
    }
    Ok(text)
}
