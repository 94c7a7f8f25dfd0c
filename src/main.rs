//! # IPO GMP Notify
//!
//! Scrapes the live IPO grey market premium (GMP) table, keeps the
//! mainboard issues still worth applying to, and posts a summary to a
//! Telegram chat.
//!
//! ## Usage
//!
//! ```sh
//! BOT_TOKEN=... CHAT_ID=... ipo_gmp_notify
//! ipo_gmp_notify --html-file page.html --dry-run --json
//! ```
//!
//! ## Architecture
//!
//! One run is a straight line:
//! 1. **Fetching**: HTTP GET, headless browser, or a saved file
//! 2. **Extraction**: locate the GMP table and walk its data rows
//! 3. **Normalization**: parse each row into an `IpoRecord`
//! 4. **Selection**: filter and rank the issues
//! 5. **Delivery**: format one message and send it
//!
//! A failed run exits non-zero after a best-effort failure notice.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod error;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod scrapers;
mod select;
mod utils;

use cli::Cli;
use error::RunError;
use outputs::telegram::{TelegramClient, TelegramNotifier};
use outputs::{Sink, StdoutNotifier};
use pipeline::{Pipeline, RunContext};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ipo_gmp_notify starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(url = %args.url, dry_run = args.dry_run, browser = ?args.browser, html_file = ?args.html_file, "Parsed CLI arguments");

    let ctx = RunContext::now(&args.url, args.label.as_deref());
    info!(label = %ctx.label, today = %ctx.today, "Run context ready");

    // ---- Wire up source and notifier ----
    let pipeline = match build_pipeline(&args) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "Cannot start run");
            return Err(e.into());
        }
    };

    // ---- Run ----
    match pipeline.run(&ctx).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report.selected)?);
            }
            let elapsed = start_time.elapsed();
            info!(
                ?elapsed,
                normalized = report.normalized,
                selected = report.selected.len(),
                "Execution complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            pipeline.report_failure(&ctx, &e).await;
            Err(e.into())
        }
    }
}

fn build_pipeline(args: &Cli) -> Result<Pipeline<scrapers::sources::Source, Sink>, RunError> {
    let source = args.page_source()?;
    let sink = if args.dry_run {
        Sink::Stdout(StdoutNotifier)
    } else {
        Sink::Telegram(TelegramNotifier::new(TelegramClient::new()?, args.credentials()?))
    };
    Ok(Pipeline::new(source, sink))
}
