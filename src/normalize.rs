//! Turn raw table rows into [`IpoRecord`]s.
//!
//! Each cell is parsed on its own. A cell that cannot be parsed is logged and
//! its field left absent; the rest of the row still produces a record. Only
//! an unusable company name drops the row.
//!
//! Everything here is a pure function of the reference date, the column map
//! and the row, so normalizing the same rows twice gives the same records.

use crate::error::ParseError;
use crate::models::{ColumnMap, IpoRecord, IpoStatus, Money, PriceBand, RawRow};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<sign>[-−])?\s*(?:₹|Rs\.?|INR)?\s*(?P<sign2>[-−])?\s*(?P<int>\d[\d,]*)(?:\.(?P<frac>\d+))?")
        .expect("valid regex")
});

static EMBEDDED_PCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*(?P<pct>[-−+]?\s*\d+(?:\.\d+)?)\s*%\s*\)").expect("valid regex")
});

/// Name fragments of promotional or boilerplate rows.
const NON_DATA_MARKERS: &[&str] = &["advertisement", "sponsored", "disclaimer", "click here"];

/// Year-less dates further than this from the reference date belong to the
/// neighbouring year.
const HALF_YEAR_DAYS: i64 = 182;

const DATED_FORMATS: &[&str] = &["%d-%b-%Y", "%d %b %Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%b %d, %Y"];

/// Converts [`RawRow`]s into [`IpoRecord`]s relative to a reference date.
///
/// The reference date supplies the year for `dd-Mon` dates and decides
/// whether an issue is upcoming, open or closed when the page does not say.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    today: NaiveDate,
}

impl Normalizer {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Normalize one row.
    ///
    /// - `Ok(Some(record))`: a data row
    /// - `Ok(None)`: a recognizable non-data row (ads, disclaimers, repeated headers)
    /// - `Err(ParseError::BlankName)`: no usable company name; the row is dropped
    pub fn normalize(&self, columns: &ColumnMap, row: &RawRow) -> Result<Option<IpoRecord>, ParseError> {
        let raw_name = row.get(columns.name).unwrap_or_default();
        let (name, marker_status) = clean_name(raw_name);
        if name.is_empty() {
            return Err(ParseError::BlankName);
        }
        if is_non_data(&name, &columns.name_label) {
            debug!(%name, "Skipping non-data row");
            return Ok(None);
        }

        let cell = |index: Option<usize>| index.and_then(|i| row.get(i));
        let gmp_cell = row.get(columns.gmp);

        let gmp = recover(&name, gmp_cell.map(|t| parse_money("GMP", t)));
        let gmp_pct = match columns.gmp_pct {
            Some(_) => recover(&name, cell(columns.gmp_pct).map(parse_percentage)),
            None => gmp_cell.and_then(embedded_percentage),
        };
        let price_band = recover(&name, cell(columns.price).map(parse_price_band));
        let issue_size_cr = recover(&name, cell(columns.issue_size).map(parse_issue_size));
        let subscription = cell(columns.subscription)
            .filter(|t| !is_absent(t))
            .map(str::to_string);

        let open_date = cell(columns.open).and_then(|t| self.parse_date(t));
        let close_date = cell(columns.close).and_then(|t| self.parse_date(t));
        let listing_cell = cell(columns.listing);
        let listing_date = listing_cell.and_then(|t| self.parse_date(t));
        let listing_withdrawn = listing_cell.is_some_and(|t| t.contains('❌'));

        let status = cell(columns.status)
            .and_then(IpoStatus::parse)
            .or(marker_status)
            .or_else(|| self.status_from_dates(open_date, close_date))
            .unwrap_or(IpoStatus::Unknown);

        let is_sme = name.to_uppercase().split_whitespace().any(|w| w == "SME");

        Ok(Some(IpoRecord {
            name,
            gmp,
            gmp_pct,
            status,
            subscription,
            price_band,
            issue_size_cr,
            open_date,
            close_date,
            listing_date,
            is_sme,
            listing_withdrawn,
        }))
    }

    /// Normalize every row in order, dropping skipped and unnamed rows.
    #[instrument(level = "info", skip_all)]
    pub fn normalize_all<I>(&self, columns: &ColumnMap, rows: I) -> Vec<IpoRecord>
    where
        I: IntoIterator<Item = RawRow>,
    {
        let mut records = Vec::new();
        let (mut skipped, mut dropped) = (0usize, 0usize);

        for (index, row) in rows.into_iter().enumerate() {
            match self.normalize(columns, &row) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => skipped += 1,
                Err(e) => {
                    warn!(row = index, error = %e, cells = ?row.cells(), "Dropping row");
                    dropped += 1;
                }
            }
        }

        info!(records = records.len(), skipped, dropped, "Normalized GMP rows");
        records
    }

    /// Parse a date cell.
    ///
    /// # Arguments
    ///
    /// * `text` - Cell text such as `24-Oct`, `05 Jan 2026` or `2025-12-01`
    ///
    /// # Returns
    ///
    /// The date, or `None` for placeholders and unrecognized text. Year-less
    /// `dd-Mon` dates take the year that puts them within six months of the
    /// reference date, so `02-Jan` read on 30 December lands in the next year.
    pub fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let t = text.replace('❌', "");
        let t = t.trim();
        if is_absent(t) {
            return None;
        }

        let parsed = DATED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(t, fmt).ok())
            .or_else(|| self.yearless_date(t, '-', "%d-%b-%Y"))
            .or_else(|| self.yearless_date(t, ' ', "%d %b %Y"));

        if parsed.is_none() {
            debug!(value = t, "Unrecognized date");
        }
        parsed
    }

    fn yearless_date(&self, text: &str, sep: char, fmt: &str) -> Option<NaiveDate> {
        let in_year = |year: i32| NaiveDate::parse_from_str(&format!("{text}{sep}{year}"), fmt).ok();
        let year = self.today.year();
        let date = in_year(year)?;
        let offset = (date - self.today).num_days();

        let wrapped = if offset < -HALF_YEAR_DAYS {
            in_year(year + 1)
        } else if offset > HALF_YEAR_DAYS {
            in_year(year - 1)
        } else {
            None
        };
        Some(wrapped.unwrap_or(date))
    }

    fn status_from_dates(&self, open: Option<NaiveDate>, close: Option<NaiveDate>) -> Option<IpoStatus> {
        match (open, close) {
            (Some(open), _) if self.today < open => Some(IpoStatus::Upcoming),
            (Some(open), Some(close)) if open <= self.today && self.today <= close => Some(IpoStatus::Open),
            (_, Some(close)) if self.today > close => Some(IpoStatus::Closed),
            _ => None,
        }
    }
}

/// Log a field-level failure and fall back to "absent".
fn recover<T>(company: &str, parsed: Option<Result<Option<T>, ParseError>>) -> Option<T> {
    match parsed? {
        Ok(value) => value,
        Err(e) => {
            warn!(company, error = %e, "Unparseable field left absent");
            None
        }
    }
}

/// Placeholder text the source uses for "no value yet".
pub fn is_absent(text: &str) -> bool {
    let t = text.trim();
    t.is_empty()
        || matches!(
            t.to_ascii_uppercase().as_str(),
            "-" | "--" | "---" | "–" | "—" | "N/A" | "NA" | "NIL" | "TBA"
        )
}

/// Collapse whitespace and strip the trailing status letter the source
/// appends to names (`Alpha Infra IPO U`).
pub fn clean_name(raw: &str) -> (String, Option<IpoStatus>) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some((head, tail)) = collapsed.rsplit_once(' ') {
        let mut chars = tail.chars();
        if let (Some(marker), None) = (chars.next(), chars.next()) {
            if let Some(status) = IpoStatus::from_marker(marker) {
                return (head.trim_end().to_string(), Some(status));
            }
        }
    }
    (collapsed, None)
}

fn is_non_data(name: &str, header_label: &str) -> bool {
    let lower = name.to_lowercase();
    (!header_label.is_empty() && lower == header_label.to_lowercase())
        || NON_DATA_MARKERS.iter().any(|m| lower.contains(m))
}

/// Parse a rupee amount into paise, keeping its sign.
///
/// Only the first amount in the cell is read, so `₹45 (18.2%)` gives ₹45.
///
/// # Arguments
///
/// * `field` - Field name reported in errors (`"GMP"`, `"price"`)
/// * `text` - Raw cell text
///
/// # Returns
///
/// - `Ok(Some(money))` for an amount with at most two significant decimals
/// - `Ok(None)` for placeholders such as `-` or `N/A`
/// - `Err(ParseError::NoDigits)` when the text has no digits at all
/// - `Err(ParseError::BadNumber)` when the amount overflows or has non-zero
///   digits past the paisa (`12.345`)
pub fn parse_money(field: &'static str, text: &str) -> Result<Option<Money>, ParseError> {
    let t = text.trim();
    if is_absent(t) {
        return Ok(None);
    }
    let bare: String = t
        .chars()
        .filter(|c| !matches!(c, '₹' | ',') && !c.is_whitespace())
        .collect();
    if is_absent(&bare) {
        return Ok(None);
    }

    let caps = AMOUNT.captures(t).ok_or_else(|| ParseError::NoDigits {
        field,
        value: t.to_string(),
    })?;
    let out_of_range = || ParseError::BadNumber {
        field,
        value: t.to_string(),
    };

    let rupees: i64 = caps["int"].replace(',', "").parse().map_err(|_| out_of_range())?;
    let paise: i64 = match caps.name("frac") {
        Some(frac) => {
            let frac = frac.as_str();
            if frac.chars().skip(2).any(|c| c != '0') {
                return Err(out_of_range());
            }
            let digits: String = frac.chars().chain(['0', '0']).take(2).collect();
            digits.parse().map_err(|_| out_of_range())?
        }
        None => 0,
    };
    let magnitude = rupees
        .checked_mul(100)
        .and_then(|p| p.checked_add(paise))
        .ok_or_else(out_of_range)?;

    let negative = caps.name("sign").is_some() || caps.name("sign2").is_some();
    Ok(Some(Money::from_paise(if negative { -magnitude } else { magnitude })))
}

/// Parse a percentage cell such as `18.2%` or `(4.00%)`.
pub fn parse_percentage(text: &str) -> Result<Option<f64>, ParseError> {
    let t = text.trim();
    if is_absent(t) {
        return Ok(None);
    }
    let cleaned: String = t
        .chars()
        .filter(|c| !matches!(c, '%' | '(' | ')' | '+') && !c.is_whitespace())
        .map(|c| if c == '−' { '-' } else { c })
        .collect();
    if is_absent(&cleaned) {
        return Ok(None);
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| ParseError::BadPercentage {
            value: t.to_string(),
        })
}

/// The `(x%)` part of a combined GMP cell, if present.
fn embedded_percentage(text: &str) -> Option<f64> {
    let caps = EMBEDDED_PCT.captures(text)?;
    let pct: String = caps["pct"]
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '+')
        .map(|c| if c == '−' { '-' } else { c })
        .collect();
    pct.parse().ok()
}

/// Parse `₹95-100`, `95 to 100` or a single fixed price.
pub fn parse_price_band(text: &str) -> Result<Option<PriceBand>, ParseError> {
    let t = text.trim();
    if is_absent(t) {
        return Ok(None);
    }
    let normalized = t.replace(" to ", "-").replace(['–', '—'], "-");
    let parts: Vec<&str> = normalized
        .split('-')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let bounds = match parts.as_slice() {
        [single] => parse_money("price", single)?.map(|price| (price, price)),
        [low, high] => match (parse_money("price", low)?, parse_money("price", high)?) {
            (Some(low), Some(high)) => Some((low, high)),
            _ => None,
        },
        _ => {
            return Err(ParseError::BadNumber {
                field: "price",
                value: t.to_string(),
            });
        }
    };

    Ok(bounds.map(|(a, b)| PriceBand {
        low: a.min(b),
        high: a.max(b),
    }))
}

/// Parse an issue size in crores (`1,200.00`, `₹650.25 Cr`).
pub fn parse_issue_size(text: &str) -> Result<Option<f64>, ParseError> {
    let t = text.trim();
    if is_absent(t) {
        return Ok(None);
    }
    let cleaned: String = t
        .trim_end_matches(|c: char| c.is_alphabetic() || c == '.' || c.is_whitespace())
        .chars()
        .filter(|c| !matches!(c, '₹' | ',') && !c.is_whitespace())
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(ParseError::NoDigits {
            field: "IPO size",
            value: t.to_string(),
        });
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(Some)
        .ok_or_else(|| ParseError::BadNumber {
            field: "IPO size",
            value: t.to_string(),
        })
}
