//! Telegram Bot API delivery.
//!
//! Messages go out through a single `sendMessage` call per part with
//! `parse_mode=HTML`. Messages longer than [`MESSAGE_LIMIT`] are split on
//! line boundaries first.

use super::Notifier;
use crate::cli::Credentials;
use crate::error::DeliveryError;
use crate::models::NotificationMessage;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// Characters per message part. Telegram's hard limit is 4096 UTF-16 units,
/// and emoji count twice.
pub const MESSAGE_LIMIT: usize = 4000;

/// Outcome of one `sendMessage` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub success: bool,
    pub error: Option<String>,
}

impl DeliveryResult {
    fn delivered() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Thin client for the Bot API `sendMessage` method.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: Url,
}

impl TelegramClient {
    pub fn new() -> Result<Self, DeliveryError> {
        Self::with_base_url(TELEGRAM_API)
    }

    /// Point the client at another Bot API server.
    pub fn with_base_url(base_url: &str) -> Result<Self, DeliveryError> {
        let base_url = Url::parse(base_url).map_err(|e| DeliveryError::InvalidEndpoint {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, token: &str) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(&format!("bot{token}"))
            .push("sendMessage");
        Some(url)
    }

    /// Post `text` to `chat_id` with `parse_mode=HTML`.
    ///
    /// # Arguments
    ///
    /// * `token` - Bot token; kept out of logs
    /// * `chat_id` - Target chat, negative for groups and channels
    /// * `text` - One message part, already within [`MESSAGE_LIMIT`]
    ///
    /// # Returns
    ///
    /// A [`DeliveryResult`]. Transport errors, non-JSON replies and `ok: false`
    /// responses all come back as `success: false` with a description; the
    /// call never retries.
    #[instrument(level = "info", skip(self, token, text), fields(chars = text.chars().count()))]
    pub async fn send_message(&self, token: &str, chat_id: &str, text: &str) -> DeliveryResult {
        let Some(url) = self.endpoint(token) else {
            return DeliveryResult::failed("API base URL cannot carry a path");
        };
        let payload = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = match self.client.post(url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => return DeliveryResult::failed(e.without_url().to_string()),
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return DeliveryResult::failed(e.without_url().to_string()),
        };
        debug!(%status, body = %truncate_for_log(&body, 300), "Telegram response");

        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(api) if api.ok => DeliveryResult::delivered(),
            Ok(api) => DeliveryResult::failed(
                api.description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ),
            Err(_) => DeliveryResult::failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&body, 200)
            )),
        }
    }
}

/// Delivers messages to one chat with fixed credentials.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: TelegramClient,
    credentials: Credentials,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

impl Notifier for TelegramNotifier {
    #[instrument(level = "info", skip_all, fields(chat_id = %self.credentials.chat_id))]
    async fn deliver(&self, message: NotificationMessage) -> Result<(), DeliveryError> {
        let parts = message.chunks(MESSAGE_LIMIT);
        let total = parts.len();

        for (index, part) in parts.iter().enumerate() {
            let result = self
                .client
                .send_message(&self.credentials.bot_token, &self.credentials.chat_id, part)
                .await;
            if !result.success {
                let description = result.error.unwrap_or_else(|| "unknown error".to_string());
                warn!(part = index + 1, total, error = %description, "Telegram rejected message");
                return Err(DeliveryError::Rejected { description });
            }
            debug!(part = index + 1, total, "Sent message part");
        }

        info!(parts = total, "Delivered Telegram notification");
        Ok(())
    }
}
