//! Render selected IPOs into a chat message.
//!
//! The message is written for Telegram's HTML parse mode: names are bold and
//! every piece of scraped text is escaped.
//!
//! # Layout
//!
//! ```text
//! 📢 IPO GMP Update · Morning · 20-10-2025 09:00
//!
//! 🔜 Upcoming IPOs - Order of apply
//! 1. Gamma Tech IPO (Opens: 17-Oct, Closes: 21-Oct)
//! 2. Alpha Infra IPO (Opens: 24-Oct, Closes: 28-Oct)
//!
//! 📊 Details
//!
//! 🔜 Alpha Infra IPO
//! 📈 GMP: +₹45 (18.22%) | 📊 Sub: N/A
//! 💰 Price: ₹247 | Issue Size: ₹1200 Cr
//! 🗓 24-Oct–28-Oct | Listing: 31-Oct | Upcoming
//! ```

use crate::models::{IpoRecord, NotificationMessage};
use crate::pipeline::RunContext;
use crate::select::RankedEntry;
use crate::utils::escape_html;
use chrono::NaiveDate;
use tracing::{debug, instrument};

/// Body of a message for a run that found nothing to report.
pub const NO_DATA: &str = "No data available for this run.";

const NOT_AVAILABLE: &str = "N/A";

/// Build the notification for one run.
///
/// Details follow `records` order; the "order of apply" list follows
/// `ranking`. An empty `records` slice still yields a complete message.
#[instrument(level = "info", skip_all, fields(records = records.len()))]
pub fn format_message(
    ctx: &RunContext,
    records: &[IpoRecord],
    ranking: &[RankedEntry],
) -> NotificationMessage {
    let header = header_line(ctx);
    let mut lines = vec![String::new()];

    if records.is_empty() {
        lines.push(NO_DATA.to_string());
        debug!("No records; sending the no-data message");
        return NotificationMessage::new(header, lines);
    }

    lines.push("🔜 <b>Upcoming IPOs - Order of apply</b>".to_string());
    for entry in ranking {
        if let Some(record) = records.get(entry.index) {
            lines.push(format!(
                "{}. {} (Opens: {}, Closes: {})",
                entry.rank,
                escape_html(&record.name),
                short_date(record.open_date),
                short_date(record.close_date),
            ));
        }
    }

    lines.push(String::new());
    lines.push("📊 <b>Details</b>".to_string());
    for record in records {
        lines.push(String::new());
        lines.extend(record_lines(record));
    }

    NotificationMessage::new(header, lines)
}

/// Message sent in place of the summary when a run fails.
pub fn failure_notice(ctx: &RunContext, error: &dyn std::error::Error) -> NotificationMessage {
    NotificationMessage::new(
        header_line(ctx),
        vec![
            String::new(),
            "❌ <b>IPO GMP update failed</b>".to_string(),
            escape_html(&error.to_string()),
        ],
    )
}

fn header_line(ctx: &RunContext) -> String {
    format!(
        "📢 <b>IPO GMP Update</b> · {} · {}",
        escape_html(&ctx.label),
        ctx.generated_at.format("%d-%m-%Y %H:%M")
    )
}

/// The fixed four-line block for one record.
fn record_lines(record: &IpoRecord) -> [String; 4] {
    let gmp = record
        .gmp
        .map(|g| g.signed())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let pct = record
        .gmp_pct
        .map(|p| format!("{p}%"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let subscription = record
        .subscription
        .as_deref()
        .map(escape_html)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let price = record
        .price_band
        .map(|band| band.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let size = record
        .issue_size_cr
        .map(|size| format!("₹{size} Cr"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    [
        format!("🔜 <b>{}</b>", escape_html(&record.name)),
        format!("📈 GMP: {gmp} ({pct}) | 📊 Sub: {subscription}"),
        format!("💰 Price: {price} | Issue Size: {size}"),
        format!(
            "🗓 {}–{} | Listing: {} | {}",
            short_date(record.open_date),
            short_date(record.close_date),
            short_date(record.listing_date),
            escape_html(&record.status.to_string()),
        ),
    ]
}

fn short_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d-%b").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
