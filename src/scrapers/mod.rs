//! Page loading and GMP table extraction.
//!
//! Loading a page and walking its table are kept apart so the extractor can
//! run against recorded HTML as easily as against the live site.
//!
//! | Source | Type | Notes |
//! |--------|------|-------|
//! | Plain HTTP | [`sources::HttpSource`] | Server-rendered markup only |
//! | Headless Chromium | [`sources::BrowserSource`] | Dumps the DOM after scripts run |
//! | Local file | [`sources::FileSource`] | Replays a saved page |
//!
//! [`investorgain`] turns a loaded [`Document`] into raw table rows.

use crate::error::FetchError;
use scraper::Html;

pub mod investorgain;
pub mod sources;

/// A parsed HTML page together with the URL it was loaded for.
pub struct Document {
    url: String,
    html: Html,
}

impl Document {
    pub fn parse(url: impl Into<String>, body: &str) -> Self {
        Self {
            url: url.into(),
            html: Html::parse_document(body),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn html(&self) -> &Html {
        &self.html
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").field("url", &self.url).finish()
    }
}

/// Anything that can turn a URL into a [`Document`].
///
/// Implementations make a single attempt; retrying is left to whoever
/// schedules the next run.
pub trait PageSource {
    async fn fetch_page(&self, url: &str) -> Result<Document, FetchError>;
}
