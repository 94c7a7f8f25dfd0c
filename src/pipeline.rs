//! One run: fetch, extract, normalize, select, format, deliver.
//!
//! The stages run strictly in sequence. A fetch, extraction or delivery
//! failure ends the run; there is no retry inside the process.

use crate::error::RunError;
use crate::models::IpoRecord;
use crate::normalize::Normalizer;
use crate::outputs::Notifier;
use crate::outputs::message::{failure_notice, format_message};
use crate::scrapers::PageSource;
use crate::scrapers::investorgain::extract_table;
use crate::select::{RankedEntry, Selection, apply_order};
use crate::utils::{edition_label, upcase};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

/// Inputs that identify a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub url: String,
    /// Slot name shown in the message header.
    pub label: String,
    pub generated_at: NaiveDateTime,
    /// Reference date for date parsing and the close-date filter.
    pub today: NaiveDate,
}

impl RunContext {
    /// Context for a run starting now, in local time.
    pub fn now(url: impl Into<String>, label: Option<&str>) -> Self {
        let generated_at = Local::now().naive_local();
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(upcase)
            .unwrap_or_else(|| edition_label(generated_at.time()).to_string());
        Self {
            url: url.into(),
            label,
            generated_at,
            today: generated_at.date(),
        }
    }
}

/// What a successful run found and sent.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Records that survived normalization, before selection.
    pub normalized: usize,
    /// Selected records, in page order.
    pub selected: Vec<IpoRecord>,
    pub ranking: Vec<RankedEntry>,
}

pub struct Pipeline<S, N> {
    source: S,
    notifier: N,
    selection: Selection,
}

impl<S: PageSource, N: Notifier> Pipeline<S, N> {
    pub fn new(source: S, notifier: N) -> Self {
        Self {
            source,
            notifier,
            selection: Selection::default(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Execute the full pipeline once.
    #[instrument(level = "info", skip_all, fields(url = %ctx.url, label = %ctx.label))]
    pub async fn run(&self, ctx: &RunContext) -> Result<RunReport, RunError> {
        let records = self.collect(ctx).await?;
        let normalized = records.len();
        let selected = self.selection.apply(records, ctx.today);
        let ranking = apply_order(&selected);

        let message = format_message(ctx, &selected, &ranking);
        self.notifier.deliver(message).await?;

        info!(normalized, selected = selected.len(), "Run complete");
        Ok(RunReport {
            normalized,
            selected,
            ranking,
        })
    }

    /// Fetch the page and normalize every row of the GMP table.
    pub async fn collect(&self, ctx: &RunContext) -> Result<Vec<IpoRecord>, RunError> {
        let doc = self.source.fetch_page(&ctx.url).await?;
        let table = extract_table(&doc)?;
        let columns = table.columns().clone();
        Ok(Normalizer::new(ctx.today).normalize_all(&columns, table))
    }

    /// Best-effort notice that the run failed. Makes a single attempt and
    /// never fails itself.
    #[instrument(level = "info", skip_all)]
    pub async fn report_failure(&self, ctx: &RunContext, failure: &RunError) {
        if !failure.channel_usable() {
            warn!("Chat channel unusable; not sending a failure notice");
            return;
        }
        match self.notifier.deliver(failure_notice(ctx, failure)).await {
            Ok(()) => info!("Sent failure notice"),
            Err(e) => error!(error = %e, "Failed to send failure notice"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryError, ExtractionError, FetchError};
    use crate::models::{IpoStatus, Money, NotificationMessage};
    use crate::outputs::message::NO_DATA;
    use crate::scrapers::Document;
    use crate::scrapers::sources::FileSource;
    use std::sync::Mutex;

    const FIXTURE: &str = include_str!("../tests/fixtures/live_ipo_gmp.html");

    struct StaticPage(&'static str);

    impl PageSource for StaticPage {
        async fn fetch_page(&self, url: &str) -> Result<Document, FetchError> {
            Ok(Document::parse(url, self.0))
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<NotificationMessage>>,
        reject: bool,
    }

    impl Recorder {
        fn rejecting() -> Self {
            Self {
                reject: true,
                ..Self::default()
            }
        }

        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.render()).collect()
        }
    }

    impl Notifier for Recorder {
        async fn deliver(&self, message: NotificationMessage) -> Result<(), DeliveryError> {
            if self.reject {
                return Err(DeliveryError::Rejected {
                    description: "Forbidden: bot was blocked by the user".to_string(),
                });
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn ctx() -> RunContext {
        let today = NaiveDate::from_ymd_opt(2025, 10, 20).unwrap();
        RunContext {
            url: "https://www.investorgain.com/report/live-ipo-gmp/331/".to_string(),
            label: "Morning".to_string(),
            generated_at: today.and_hms_opt(9, 0, 0).unwrap(),
            today,
        }
    }

    #[tokio::test]
    async fn test_fixture_end_to_end() {
        let pipeline = Pipeline::new(StaticPage(FIXTURE), Recorder::default());
        let report = pipeline.run(&ctx()).await.unwrap();

        assert_eq!(report.normalized, 7);
        let names: Vec<&str> = report.selected.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha Infra IPO", "Gamma Tech IPO"]);
        assert_eq!(report.ranking[0].index, 1);

        let texts = pipeline.notifier.texts();
        assert_eq!(texts.len(), 1);
        let text = &texts[0];
        assert!(text.starts_with("📢 <b>IPO GMP Update</b> · Morning · 20-10-2025 09:00"));
        assert!(text.contains("1. Gamma Tech IPO (Opens: 17-Oct, Closes: 21-Oct)"));
        assert!(text.contains("2. Alpha Infra IPO (Opens: 24-Oct, Closes: 28-Oct)"));
        assert!(text.contains("📈 GMP: +₹120 (11.43%) | 📊 Sub: 3.45x"));
        assert!(!text.contains("Beta Foods"));
        assert!(!text.contains("Zeta Capital"));
    }

    #[tokio::test]
    async fn test_fixture_records_before_selection() {
        let pipeline = Pipeline::new(StaticPage(FIXTURE), Recorder::default());
        let records = pipeline.collect(&ctx()).await.unwrap();

        let delta = records.iter().find(|r| r.name == "Delta Power IPO").unwrap();
        assert_eq!(delta.gmp, Some(Money::from_rupees(-5)));
        assert_eq!(delta.gmp_pct, Some(-1.2));
        assert_eq!(delta.status, IpoStatus::Closed);

        let epsilon = records.iter().find(|r| r.name == "Epsilon Motors IPO").unwrap();
        assert_eq!(epsilon.gmp, None);
        assert_eq!(epsilon.price_band, None);
        assert_eq!(epsilon.issue_size_cr, Some(650.25));

        assert!(records.iter().all(|r| !r.name.trim().is_empty()));
    }

    #[tokio::test]
    async fn test_file_source_end_to_end() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/live_ipo_gmp.html");
        let pipeline = Pipeline::new(FileSource::new(path), Recorder::default());
        let report = pipeline.run(&ctx()).await.unwrap();
        assert_eq!(report.selected.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_table_sends_no_data_message() {
        let page = "<table><thead><tr><th>Name</th><th>GMP</th></tr></thead><tbody></tbody></table>";
        let pipeline = Pipeline::new(StaticPage(page), Recorder::default());
        let report = pipeline.run(&ctx()).await.unwrap();

        assert!(report.selected.is_empty());
        let texts = pipeline.notifier.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("📢 <b>IPO GMP Update</b>"));
        assert!(texts[0].contains(NO_DATA));
    }

    #[tokio::test]
    async fn test_missing_table_fails_run() {
        let pipeline = Pipeline::new(StaticPage("<p>Site under maintenance</p>"), Recorder::default());
        let err = pipeline.run(&ctx()).await.unwrap_err();

        assert!(matches!(err, RunError::Extraction(ExtractionError::TableMissing)));
        assert!(pipeline.notifier.texts().is_empty());

        pipeline.report_failure(&ctx(), &err).await;
        let texts = pipeline.notifier.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("IPO GMP update failed"));
    }

    #[tokio::test]
    async fn test_delivery_failure_fails_run() {
        let pipeline = Pipeline::new(StaticPage(FIXTURE), Recorder::rejecting());
        let err = pipeline.run(&ctx()).await.unwrap_err();
        assert!(matches!(err, RunError::Delivery(DeliveryError::Rejected { .. })));
        assert!(!err.channel_usable());
    }

    #[tokio::test]
    async fn test_custom_selection() {
        let everything = Selection {
            exclude_sme: false,
            exclude_withdrawn: false,
            min_issue_size_cr: 0.0,
            min_gmp: Money::from_rupees(-1000),
        };
        let pipeline = Pipeline::new(StaticPage(FIXTURE), Recorder::default()).with_selection(everything);
        let report = pipeline.run(&ctx()).await.unwrap();

        // Only the close-date rule and missing values still apply.
        let names: Vec<&str> = report.selected.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Alpha Infra IPO", "Beta Foods NSE SME", "Gamma Tech IPO", "Zeta Capital IPO", "Eta Minerals IPO"]
        );
    }

    #[test]
    fn test_run_context_label() {
        let ctx = RunContext::now("https://example.com", Some(" evening "));
        assert_eq!(ctx.label, "Evening");
        assert_eq!(ctx.today, ctx.generated_at.date());

        let ctx = RunContext::now("https://example.com", None);
        assert!(ctx.label == "Morning" || ctx.label == "Evening");
    }
}
