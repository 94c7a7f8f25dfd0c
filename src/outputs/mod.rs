//! Message rendering and delivery.
//!
//! # Submodules
//!
//! - [`message`]: renders selected IPOs into a [`NotificationMessage`]
//! - [`telegram`]: posts the message through the Telegram Bot API
//!
//! Delivery goes through the [`Notifier`] trait so a run can print its
//! message instead of sending it (`--dry-run`).

use crate::error::DeliveryError;
use crate::models::NotificationMessage;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

pub mod message;
pub mod telegram;

/// Something that can deliver a finished notification.
///
/// The message is taken by value: each run's message is delivered once.
pub trait Notifier {
    async fn deliver(&self, message: NotificationMessage) -> Result<(), DeliveryError>;
}

/// Writes the rendered message to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    #[instrument(level = "info", skip_all)]
    async fn deliver(&self, message: NotificationMessage) -> Result<(), DeliveryError> {
        let mut stdout = tokio::io::stdout();
        let text = message.render();
        stdout.write_all(text.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        info!(chars = text.chars().count(), "Printed notification (dry run)");
        Ok(())
    }
}

/// The notifier chosen on the command line.
#[derive(Debug, Clone)]
pub enum Sink {
    Telegram(telegram::TelegramNotifier),
    Stdout(StdoutNotifier),
}

impl Notifier for Sink {
    async fn deliver(&self, message: NotificationMessage) -> Result<(), DeliveryError> {
        match self {
            Sink::Telegram(notifier) => notifier.deliver(message).await,
            Sink::Stdout(notifier) => notifier.deliver(message).await,
        }
    }
}
