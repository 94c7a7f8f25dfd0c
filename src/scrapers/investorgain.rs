//! Row extraction for the [InvestorGain live IPO GMP report](https://www.investorgain.com/report/live-ipo-gmp/331/).
//!
//! The report is a single sortable `<table>`. Column order has shifted over
//! time, so columns are located by header label rather than by position.
//!
//! # Row Filtering
//!
//! Rows are skipped when they:
//! - have fewer `<td>` cells than the header has columns (ad banners and
//!   notes are single `colspan` cells)
//! - have an empty name cell
//! - repeat the header label in the name cell

use super::Document;
use crate::error::ExtractionError;
use crate::models::{ColumnMap, RawRow};
use once_cell::sync::Lazy;
use scraper::element_ref::Select;
use scraper::{ElementRef, Selector};
use std::fmt;
use tracing::{debug, info, instrument};

pub const DEFAULT_URL: &str = "https://www.investorgain.com/report/live-ipo-gmp/331/";

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("valid selector"));
static HEADER_CELLS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("thead th").expect("valid selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static ANY_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").expect("valid selector"));
static DATA_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));

const NAME_LABELS: &[&str] = &["name", "iponame", "ipo", "company", "companyname"];
const GMP_LABELS: &[&str] = &["gmp", "gmprs", "gmpinr", "latestgmp"];
const GMP_PCT_LABELS: &[&str] = &["gmp%", "gmppercent", "gain%", "listinggain", "estlistinggain"];
const STATUS_LABELS: &[&str] = &["status", "ipostatus"];
const SUBSCRIPTION_LABELS: &[&str] = &["sub", "subscription", "subscribed"];
const PRICE_LABELS: &[&str] = &["price", "priceband", "issueprice"];
const SIZE_LABELS: &[&str] = &["iposize", "issuesize", "sizecr", "iposizecr"];
const OPEN_LABELS: &[&str] = &["open", "opendate", "opens"];
const CLOSE_LABELS: &[&str] = &["close", "closedate", "closes"];
const LISTING_LABELS: &[&str] = &["listing", "listingdate", "listingon"];

/// The GMP table located in a document.
///
/// Iterating yields its data rows once, in page order.
pub struct ExtractedTable<'a> {
    columns: ColumnMap,
    rows: Select<'a, 'static>,
    skipped: usize,
    finished: bool,
}

impl ExtractedTable<'_> {
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }
}

impl fmt::Debug for ExtractedTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractedTable")
            .field("columns", &self.columns)
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl Iterator for ExtractedTable<'_> {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        for tr in self.rows.by_ref() {
            let cells: Vec<String> = tr.select(&DATA_CELL).map(cell_text).collect();

            if cells.len() < self.columns.width {
                if !cells.is_empty() {
                    debug!(cells = cells.len(), expected = self.columns.width, "Skipping narrow row");
                }
                self.skipped += 1;
                continue;
            }

            let primary = cells[self.columns.name].as_str();
            if primary.is_empty() {
                debug!("Skipping row with empty name cell");
                self.skipped += 1;
                continue;
            }
            if header_key(primary) == header_key(&self.columns.name_label) {
                debug!("Skipping repeated header row");
                self.skipped += 1;
                continue;
            }

            return Some(RawRow::new(cells));
        }
        if !self.finished {
            self.finished = true;
            debug!(skipped = self.skipped, "Finished walking GMP table");
        }
        None
    }
}

/// Locate the GMP table in `doc`.
///
/// The first `<table>` whose header carries both a name and a GMP column is
/// used.
///
/// # Returns
///
/// The table's [`ColumnMap`] and a lazy row iterator. A table with no data
/// rows yields nothing; a page with no matching table is an
/// [`ExtractionError`].
#[instrument(level = "info", skip_all, fields(url = %doc.url()))]
pub fn extract_table(doc: &Document) -> Result<ExtractedTable<'_>, ExtractionError> {
    let mut last_error = ExtractionError::TableMissing;

    for (index, table) in doc.html().select(&TABLE).enumerate() {
        let headers = header_cells(table);
        match map_columns(&headers) {
            Ok(columns) => {
                info!(table = index, columns = columns.width, "Located GMP table");
                return Ok(ExtractedTable {
                    columns,
                    rows: table.select(&ROW),
                    skipped: 0,
                    finished: false,
                });
            }
            Err(e) => {
                debug!(table = index, error = %e, ?headers, "Table does not look like the GMP report");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Build a [`ColumnMap`] from header labels.
///
/// Labels are compared with sort arrows, punctuation, whitespace and case
/// removed, so `IPO Size▲▼` matches `iposize`.
pub fn map_columns<S: AsRef<str>>(headers: &[S]) -> Result<ColumnMap, ExtractionError> {
    let keys: Vec<String> = headers.iter().map(|h| header_key(h.as_ref())).collect();
    let find = |labels: &[&str]| keys.iter().position(|k| labels.contains(&k.as_str()));

    let name = find(NAME_LABELS).ok_or(ExtractionError::MissingColumn { column: "Name" })?;
    let gmp = find(GMP_LABELS).ok_or(ExtractionError::MissingColumn { column: "GMP" })?;

    Ok(ColumnMap {
        width: headers.len(),
        name,
        gmp,
        gmp_pct: find(GMP_PCT_LABELS),
        status: find(STATUS_LABELS),
        subscription: find(SUBSCRIPTION_LABELS),
        price: find(PRICE_LABELS),
        issue_size: find(SIZE_LABELS),
        open: find(OPEN_LABELS),
        close: find(CLOSE_LABELS),
        listing: find(LISTING_LABELS),
        name_label: clean_header(headers[name].as_ref()),
    })
}

fn header_cells(table: ElementRef<'_>) -> Vec<String> {
    let from_thead: Vec<String> = table
        .select(&HEADER_CELLS)
        .map(|th| clean_header(&cell_text(th)))
        .collect();
    if !from_thead.is_empty() {
        return from_thead;
    }

    table
        .select(&ROW)
        .next()
        .map(|tr| {
            tr.select(&ANY_CELL)
                .map(|cell| clean_header(&cell_text(cell)))
                .collect()
        })
        .unwrap_or_default()
}

fn clean_header(label: &str) -> String {
    label.replace(['▲', '▼'], "").trim().to_string()
}

fn header_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '%')
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
