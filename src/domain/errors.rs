//! Crawl error taxonomy
//!
//! Remote failures and storage failures are kept apart: a remote failure can
//! be skipped over (the key is simply redone on the next run), a storage
//! failure always stops the run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("HTTP request failed: {url} - {message}")]
    Transport { url: String, message: String },

    #[error("HTTP error {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Search key out of range: {0}")]
    InvalidSearchKey(u32),
}

pub type CrawlResult<T> = Result<T, CrawlError>;

impl CrawlError {
    pub fn transport(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors raised by the remote record source rather than by local state.
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::HttpStatus { .. } | Self::MalformedResponse { .. }
        )
    }

    /// Short label for structured logs and run statistics.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::HttpStatus { .. } => "http_status",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Storage(_) => "storage",
            Self::InvalidSearchKey(_) => "invalid_search_key",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_are_classified() {
        assert!(CrawlError::transport("http://x", "reset").is_remote());
        assert!(CrawlError::HttpStatus { status: 500, url: "http://x".into() }.is_remote());
        assert!(CrawlError::malformed("http://x", "not json").is_remote());
        assert!(!CrawlError::Storage(sqlx::Error::RowNotFound).is_remote());
        assert!(!CrawlError::InvalidSearchKey(100_000_000).is_remote());
    }

    #[test]
    fn display_includes_context() {
        let err = CrawlError::HttpStatus {
            status: 503,
            url: "https://example.test/getData.php".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error 503: https://example.test/getData.php"
        );
        assert_eq!(err.category(), "http_status");
    }
}
