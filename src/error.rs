//! Custom error types for rustgsprofile.
//!
//! Every fallible library function returns `Result<T, ScholarError>`.
//! Field-level absence is never an error; see [`crate::lookup`].

use thiserror::Error;

/// Main error type for rustgsprofile operations.
#[derive(Debug, Error)]
pub enum ScholarError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML parsing or page structure error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by the source site
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Source site answered with a non-success status
    #[error("HTTP error: {code} - {message}")]
    Http {
        /// Status code
        code: u16,
        /// Status line
        message: String,
    },

    /// CAPTCHA or "unusual traffic" interstitial instead of content
    #[error("CAPTCHA detected, open the profile in a browser first")]
    Captcha,

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The other side of a mailbox is gone
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// The extraction session ended with an error event
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// An extraction session is already running in this page context
    #[error("Extraction already in progress")]
    Busy,

    /// Export invoked without any selected record
    #[error("No records selected for export")]
    NothingSelected,
}

/// Result type alias using `ScholarError`
pub type Result<T> = std::result::Result<T, ScholarError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ScholarError::Parse(msg.to_string()))
    }
}

/// Compile a CSS selector, mapping failures to [`ScholarError::Parse`].
pub fn selector(css: &str) -> Result<scraper::Selector> {
    scraper::Selector::parse(css).map_err(|e| ScholarError::Parse(format!("{css}: {e}")))
}
