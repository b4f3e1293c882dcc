//! Pipeline error taxonomy
//!
//! Every failure that reaches the `process` boundary is one of these three
//! kinds. Their `Display` text is what ends up in the `{"error": ...}` record.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed URL or unusable company name, detected before any I/O
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network failure after retry exhaustion, or a non-success status
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Failure while turning a fetched body into a structured record
    #[error("Extraction failed: {0}")]
    Extraction(String),
}

impl PipelineError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// True when the error was raised before any network traffic
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            PipelineError::invalid_input("empty input").to_string(),
            "Invalid input: empty input"
        );
        assert_eq!(
            PipelineError::fetch("https://example.com", "HTTP 404 Not Found").to_string(),
            "Fetch failed for https://example.com: HTTP 404 Not Found"
        );
        assert_eq!(
            PipelineError::extraction("body is not text").to_string(),
            "Extraction failed: body is not text"
        );
    }

    #[test]
    fn test_is_invalid_input() {
        assert!(PipelineError::invalid_input("x").is_invalid_input());
        assert!(!PipelineError::fetch("u", "r").is_invalid_input());
    }
}
