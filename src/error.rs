//! Error types for Pagekeep
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by domain (content sources, downloads, filesystem,
//! configuration) so the download queue can record them per task and the UI
//! can decide how to surface them.
//!
//! ## Where errors end up
//!
//! - Content source failures (page list, image fetch) → `SourceRequestFailed`,
//!   `NetworkError`, `UnexpectedStatusCode`, `InvalidPageData`
//! - Page write failures → `FileIoError`, `IoError`
//! - Per-page timeouts → `Timeout`
//! - A panicking content source → `DownloadFailed`
//!
//! Inside the download worker every error is converted into a
//! `DownloadErrorEntry` at the task boundary and never escapes the queue.

use thiserror::Error;

/// Result type alias using our PagekeepError type
pub type Result<T> = std::result::Result<T, PagekeepError>;

/// Main error type for Pagekeep
#[derive(Error, Debug)]
pub enum PagekeepError {
    // ===== Content Source Errors =====

    /// No content source registered for the extension id
    #[error("Content source not found: {0}")]
    SourceNotFound(String),

    /// A content source call rejected (parse failure, rate limit, missing item)
    #[error("Content source '{source_id}' request failed: {message}")]
    SourceRequestFailed {
        source_id: String,
        message: String,
    },

    /// Page requester data or page url list is unusable
    #[error("Invalid page data: {0}")]
    InvalidPageData(String),

    /// Network connectivity error while fetching a page
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Image host returned a non-success status
    #[error("Server responded with unexpected status code {status_code} for {url}")]
    UnexpectedStatusCode {
        status_code: u16,
        url: String,
    },

    // ===== Download Errors =====

    /// Generic download failure
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// A single page fetch exceeded the configured timeout
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Operation was abandoned (queue cleared)
    #[error("Operation cancelled")]
    Cancelled,

    /// Queue or reader state is invalid for the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ===== File/Storage Errors =====

    /// File or directory not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Generic file I/O error with context
    #[error("File I/O error: {0}")]
    FileIoError(String),

    /// Invalid file path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // ===== Configuration Errors =====

    /// Configuration file error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// Helper methods for creating common errors
impl PagekeepError {
    /// Create a FileNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        PagekeepError::FileNotFound(resource.into())
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        PagekeepError::InvalidInput(message.into())
    }

    /// Create a SourceRequestFailed error
    pub fn source_failed<S: Into<String>, M: Into<String>>(source_id: S, message: M) -> Self {
        PagekeepError::SourceRequestFailed {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        PagekeepError::NetworkError {
            message: message.into(),
            is_transient,
        }
    }

    /// Check if error is retryable (network errors, timeouts, 5xx)
    ///
    /// The queue never retries on its own; this only informs the UI whether
    /// offering "retry" (re-enqueue) is likely to help.
    pub fn is_retryable(&self) -> bool {
        match self {
            PagekeepError::NetworkError { is_transient, .. } => *is_transient,
            PagekeepError::Timeout(_) => true,
            PagekeepError::UnexpectedStatusCode { status_code, .. } => {
                *status_code == 429 || (500..=599).contains(status_code)
            }
            PagekeepError::ReqwestError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if error came from a content source
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PagekeepError::SourceNotFound(_)
                | PagekeepError::SourceRequestFailed { .. }
                | PagekeepError::InvalidPageData(_)
                | PagekeepError::NetworkError { .. }
                | PagekeepError::UnexpectedStatusCode { .. }
                | PagekeepError::ReqwestError(_)
                | PagekeepError::UrlError(_)
        )
    }

    /// Check if error is related to file/disk operations
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            PagekeepError::FileNotFound(_)
                | PagekeepError::FileIoError(_)
                | PagekeepError::InvalidPath(_)
                | PagekeepError::IoError(_)
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            PagekeepError::SourceNotFound(id) => {
                format!("The extension '{}' is not installed. Install it to download this chapter.", id)
            }
            PagekeepError::Timeout(secs) => {
                format!("A page took longer than {} seconds to download. Please try again.", secs)
            }
            PagekeepError::UnexpectedStatusCode { status_code: 429, .. } => {
                "The source is rate limiting requests. Please wait before retrying.".to_string()
            }
            PagekeepError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                "Permission denied while writing to the downloads folder.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
