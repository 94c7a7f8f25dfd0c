//! [`PageSource`] implementations.

use super::{Document, PageSource};
use crate::error::FetchError;
use crate::utils::truncate_for_log;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const PAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetch pages with a single HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(PAGE_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpSource {
    #[instrument(level = "info", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<Document, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }
        info!(bytes = body.len(), "Fetched page over HTTP");
        Ok(Document::parse(url, &body))
    }
}

/// Render pages in headless Chromium and read back the DOM.
///
/// The GMP table is filled in by scripts, so a plain GET can come back with
/// an empty shell. The browser is given a five second virtual-time budget to
/// settle before the DOM is dumped.
#[derive(Debug, Clone)]
pub struct BrowserSource {
    binary: PathBuf,
}

impl BrowserSource {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, url: &str) -> Command {
        let user_agent = format!("--user-agent={USER_AGENT}");
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--headless=new",
            "--disable-gpu",
            "--no-sandbox",
            "--timeout=60000",
            "--virtual-time-budget=5000",
            user_agent.as_str(),
            "--dump-dom",
            url,
        ]);
        cmd.kill_on_drop(true);
        cmd
    }
}

impl PageSource for BrowserSource {
    #[instrument(level = "info", skip(self), fields(binary = %self.binary.display()))]
    async fn fetch_page(&self, url: &str) -> Result<Document, FetchError> {
        let output = self.command(url).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Browser {
                status: output.status.to_string(),
                stderr: truncate_for_log(stderr.trim(), 300),
            });
        }

        let body = String::from_utf8_lossy(&output.stdout);
        if body.trim().is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }
        info!(bytes = body.len(), "Rendered page in headless browser");
        Ok(Document::parse(url, &body))
    }
}

/// Read a previously saved page from disk, ignoring the requested URL.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PageSource for FileSource {
    #[instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    async fn fetch_page(&self, url: &str) -> Result<Document, FetchError> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        debug!(bytes = body.len(), "Loaded page from file instead of network");
        Ok(Document::parse(url, &body))
    }
}

/// The source chosen on the command line.
#[derive(Debug, Clone)]
pub enum Source {
    Http(HttpSource),
    Browser(BrowserSource),
    File(FileSource),
}

impl PageSource for Source {
    async fn fetch_page(&self, url: &str) -> Result<Document, FetchError> {
        match self {
            Source::Http(source) => source.fetch_page(url).await,
            Source::Browser(source) => source.fetch_page(url).await,
            Source::File(source) => source.fetch_page(url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use scraper::Selector;

    #[tokio::test]
    async fn test_http_source_fetches_page() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/report/live-ipo-gmp/331/");
            then.status(200)
                .header("Content-Type", "text/html")
                .body("<html><body><table><tr><th>Name</th></tr></table></body></html>");
        });

        let source = HttpSource::new().unwrap();
        let url = server.url("/report/live-ipo-gmp/331/");
        let doc = source.fetch_page(&url).await.unwrap();

        mock.assert();
        assert_eq!(doc.url(), url);
        let th = Selector::parse("th").unwrap();
        assert_eq!(doc.html().select(&th).count(), 1);
    }

    #[tokio::test]
    async fn test_http_source_reports_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/down");
            then.status(503).body("maintenance");
        });

        let source = HttpSource::new().unwrap();
        let err = source.fetch_page(&server.url("/down")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_http_source_rejects_empty_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/blank");
            then.status(200).body("   ");
        });

        let source = HttpSource::new().unwrap();
        let err = source.fetch_page(&server.url("/blank")).await.unwrap_err();
        assert!(matches!(err, FetchError::Empty { .. }));
    }

    #[tokio::test]
    async fn test_file_source_reads_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<table><tr><td>ABC Ltd</td></tr></table>").unwrap();

        let source = FileSource::new(&path);
        let doc = source.fetch_page("https://example.com").await.unwrap();
        let td = Selector::parse("td").unwrap();
        let text: String = doc.html().select(&td).flat_map(|e| e.text()).collect();
        assert_eq!(text, "ABC Ltd");
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/page.html");
        let err = source.fetch_page("https://example.com").await.unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_browser_source_reads_stdout() {
        // `echo` stands in for the browser and prints its arguments back.
        let source = BrowserSource::new("echo");
        let doc = source.fetch_page("https://example.com/gmp").await.unwrap();
        let body = Selector::parse("body").unwrap();
        let text: String = doc.html().select(&body).flat_map(|e| e.text()).collect();
        assert!(text.contains("--dump-dom https://example.com/gmp"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_browser_source_failure() {
        let source = BrowserSource::new("false");
        let err = source.fetch_page("https://example.com").await.unwrap_err();
        assert!(matches!(err, FetchError::Browser { .. }));
    }
}
