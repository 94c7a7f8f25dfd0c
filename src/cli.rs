//! Command-line interface definitions.
//!
//! The bot token and chat id normally come from the `BOT_TOKEN` and
//! `CHAT_ID` environment variables; everything else has a default suited to
//! the twice-daily scheduled run.

use crate::error::{ConfigError, FetchError};
use crate::scrapers::investorgain::DEFAULT_URL;
use crate::scrapers::sources::{BrowserSource, FileSource, HttpSource, Source};
use clap::Parser;
use std::fmt;
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Scheduled run; credentials from the environment
/// BOT_TOKEN=... CHAT_ID=... ipo_gmp_notify
///
/// # Render through headless Chromium and label the slot explicitly
/// ipo_gmp_notify --browser /usr/bin/chromium --label Evening
///
/// # Replay a saved page and print the message instead of sending it
/// ipo_gmp_notify --html-file page.html --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Telegram chat id to post to (group and channel ids are negative)
    #[arg(long, env = "CHAT_ID", allow_negative_numbers = true)]
    pub chat_id: Option<String>,

    /// GMP report page to scrape
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,

    /// Run label shown in the message header (defaults to Morning/Evening by local time)
    #[arg(short, long)]
    pub label: Option<String>,

    /// Render the page with this headless Chromium binary instead of a plain HTTP GET
    #[arg(long, conflicts_with = "html_file")]
    pub browser: Option<PathBuf>,

    /// Read the page from a saved HTML file instead of the network
    #[arg(long)]
    pub html_file: Option<PathBuf>,

    /// Print the message to stdout instead of sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Also print the selected IPOs as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Credentials for the Telegram notifier; both values are required.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let bot_token = present(&self.bot_token).ok_or(ConfigError::MissingCredential {
            name: "BOT_TOKEN",
            flag: "bot-token",
        })?;
        let chat_id = present(&self.chat_id).ok_or(ConfigError::MissingCredential {
            name: "CHAT_ID",
            flag: "chat-id",
        })?;
        Ok(Credentials { bot_token, chat_id })
    }

    /// The page source selected by `--browser` / `--html-file`.
    pub fn page_source(&self) -> Result<Source, FetchError> {
        if let Some(path) = &self.html_file {
            return Ok(Source::File(FileSource::new(path)));
        }
        if let Some(binary) = &self.browser {
            return Ok(Source::Browser(BrowserSource::new(binary)));
        }
        Ok(Source::Http(HttpSource::new()?))
    }
}

/// Telegram credentials, read once at startup and handed to the notifier.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}
