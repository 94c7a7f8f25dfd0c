//! Error taxonomy for a single notifier run.
//!
//! Errors fall into two groups:
//!
//! - **Fatal**: [`FetchError`], [`ExtractionError`], [`DeliveryError`] and
//!   [`ConfigError`]. They propagate to `main` as a [`RunError`] and end the
//!   run with a non-zero exit status. The next scheduled invocation tries again.
//! - **Recovered**: [`ParseError`] is raised per cell. The normalizer logs it
//!   and leaves the field absent, or drops the row when the company name
//!   itself is unusable.

use thiserror::Error;

/// The page could not be loaded by a [`PageSource`](crate::scrapers::PageSource).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read page source: {0}")]
    Io(#[from] std::io::Error),

    #[error("headless browser exited with {status}: {stderr}")]
    Browser { status: String, stderr: String },

    #[error("page at {url} was empty")]
    Empty { url: String },
}

/// The expected GMP table could not be located in the document.
///
/// Raised instead of returning zero rows so that a layout change on the
/// source page is never mistaken for a day without IPOs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no <table> element found in the page")]
    TableMissing,

    #[error("no table carries a `{column}` column")]
    MissingColumn { column: &'static str },
}

/// A single cell failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("company name is blank")]
    BlankName,

    #[error("no digits in {field} value `{value}`")]
    NoDigits { field: &'static str, value: String },

    #[error("{field} value `{value}` is out of range")]
    BadNumber { field: &'static str, value: String },

    #[error("unrecognized percentage `{value}`")]
    BadPercentage { value: String },
}

/// The notification could not be delivered.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("chat API rejected the message: {description}")]
    Rejected { description: String },

    #[error("invalid chat API base URL `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("chat API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to write message: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup configuration is incomplete.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing credential `{name}` (set it via --{flag} or the {name} environment variable)")]
    MissingCredential {
        name: &'static str,
        flag: &'static str,
    },
}

/// Everything that can end a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RunError {
    /// Whether a failure notice can still be sent through the chat channel.
    pub fn channel_usable(&self) -> bool {
        !matches!(self, RunError::Delivery(_) | RunError::Config(_))
    }
}
