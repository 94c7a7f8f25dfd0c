//! Data models for scraped rows, normalized IPO records and the outgoing
//! notification.
//!
//! - [`RawRow`]: cells of one table row exactly as scraped
//! - [`ColumnMap`]: which cell holds which field, derived from the table header
//! - [`IpoRecord`]: one normalized IPO listing
//! - [`NotificationMessage`]: the rendered chat message for a single run

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

/// The cells of one scraped table row, trimmed and whitespace-collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<String>,
}

impl RawRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Cell at `index`, if the row is that wide.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }
}

/// Positions of the known fields within a table row.
///
/// Only `name` and `gmp` are mandatory; every other column may be missing
/// from the source layout, in which case the matching record field stays
/// absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMap {
    /// Number of header cells; data rows narrower than this are discarded.
    pub width: usize,
    pub name: usize,
    pub gmp: usize,
    pub gmp_pct: Option<usize>,
    pub status: Option<usize>,
    pub subscription: Option<usize>,
    pub price: Option<usize>,
    pub issue_size: Option<usize>,
    pub open: Option<usize>,
    pub close: Option<usize>,
    pub listing: Option<usize>,
    /// Cleaned header label of the name column, used to spot repeated header rows.
    pub name_label: String,
}

/// A signed rupee amount held in paise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    pub const fn paise(self) -> i64 {
        self.0
    }

    /// Value in rupees, for ratio calculations only.
    pub fn as_rupees_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Render with an explicit sign: `+₹45`, `-₹15`, `₹0`.
    pub fn signed(self) -> String {
        if self.0 > 0 {
            format!("+{self}")
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let (rupees, paise) = (abs / 100, abs % 100);
        if paise == 0 {
            write!(f, "{sign}₹{rupees}")
        } else {
            write!(f, "{sign}₹{rupees}.{paise:02}")
        }
    }
}

/// Issue price range. A fixed-price issue has `low == high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBand {
    pub low: Money,
    pub high: Money,
}

impl fmt::Display for PriceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            // Drop the symbol on the upper bound: ₹95–100
            let high = self.high.to_string().replacen('₹', "", 1);
            write!(f, "{}–{}", self.low, high)
        }
    }
}

/// Subscription / listing state of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IpoStatus {
    Upcoming,
    Open,
    Closed,
    Listed,
    Other(String),
    Unknown,
}

impl IpoStatus {
    /// Interpret a status cell. Returns `None` for empty or placeholder text.
    pub fn parse(text: &str) -> Option<IpoStatus> {
        let trimmed = text.trim();
        if trimmed.is_empty() || matches!(trimmed, "-" | "--" | "N/A" | "NA") {
            return None;
        }
        let status = match trimmed.to_lowercase().as_str() {
            "open" | "opened" | "live" => IpoStatus::Open,
            "close" | "closed" => IpoStatus::Closed,
            "upcoming" | "coming soon" => IpoStatus::Upcoming,
            "listed" => IpoStatus::Listed,
            _ => IpoStatus::Other(trimmed.to_string()),
        };
        Some(status)
    }

    /// Status implied by the single-letter marker the source appends to names.
    pub fn from_marker(marker: char) -> Option<IpoStatus> {
        match marker {
            'U' => Some(IpoStatus::Upcoming),
            'O' => Some(IpoStatus::Open),
            'C' => Some(IpoStatus::Closed),
            'L' => Some(IpoStatus::Listed),
            _ => None,
        }
    }
}

impl fmt::Display for IpoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpoStatus::Upcoming => f.write_str("Upcoming"),
            IpoStatus::Open => f.write_str("Open"),
            IpoStatus::Closed => f.write_str("Closed"),
            IpoStatus::Listed => f.write_str("Listed"),
            IpoStatus::Other(text) => f.write_str(text),
            IpoStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

/// A normalized IPO listing.
///
/// `name` is never blank. Every other field is either parsed into its unit
/// or `None` when the source had no usable value; nothing defaults to zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpoRecord {
    pub name: String,
    /// Grey market premium per share; negative when quoted at a discount.
    pub gmp: Option<Money>,
    /// Premium as a percentage of the issue price.
    pub gmp_pct: Option<f64>,
    pub status: IpoStatus,
    /// Subscription text as quoted, e.g. `2.35x`.
    pub subscription: Option<String>,
    pub price_band: Option<PriceBand>,
    /// Issue size in crores of rupees.
    pub issue_size_cr: Option<f64>,
    pub open_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    /// Estimated listing date.
    pub listing_date: Option<NaiveDate>,
    pub is_sme: bool,
    /// The source marks the listing as cancelled or withdrawn.
    pub listing_withdrawn: bool,
}

impl IpoRecord {
    /// A record with only a name; all optional fields absent.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gmp: None,
            gmp_pct: None,
            status: IpoStatus::Unknown,
            subscription: None,
            price_band: None,
            issue_size_cr: None,
            open_date: None,
            close_date: None,
            listing_date: None,
            is_sme: false,
            listing_withdrawn: false,
        }
    }
}

/// The chat message produced by one run.
///
/// Built once by the formatter and handed by value to a
/// [`Notifier`](crate::outputs::Notifier); there is no way to mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    header: String,
    lines: Vec<String>,
}

impl NotificationMessage {
    pub fn new(header: String, lines: Vec<String>) -> Self {
        Self { header, lines }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Full message text, header first.
    pub fn render(&self) -> String {
        std::iter::once(&self.header).chain(&self.lines).join("\n")
    }

    /// Split the message into parts of at most `limit` characters.
    ///
    /// Parts break on line boundaries; a single line longer than `limit` is
    /// cut mid-line. Blank lines at the start of a part are dropped.
    pub fn chunks(&self, limit: usize) -> Vec<String> {
        let limit = limit.max(1);
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for line in std::iter::once(&self.header).chain(&self.lines) {
            for piece in split_line(line, limit) {
                if current.is_empty() && piece.trim().is_empty() {
                    continue;
                }
                let piece_len = piece.chars().count();
                if !current.is_empty() && current_len + 1 + piece_len > limit {
                    parts.push(std::mem::take(&mut current));
                    current_len = 0;
                    if piece.trim().is_empty() {
                        continue;
                    }
                }
                if !current.is_empty() {
                    current.push('\n');
                    current_len += 1;
                }
                current.push_str(&piece);
                current_len += piece_len;
            }
        }
        if !current.trim().is_empty() {
            parts.push(current);
        }
        parts
    }
}

/// Hard-split a line longer than `limit` characters.
///
/// Cuts never land inside an HTML tag or entity. Tags still open at a cut
/// are closed at the end of the piece and reopened at the start of the next,
/// so every piece is valid on its own in Telegram's HTML parse mode.
fn split_line(line: &str, limit: usize) -> Vec<String> {
    if line.chars().count() <= limit {
        return vec![line.to_string()];
    }

    let mut pieces = Vec::new();
    let mut open: Vec<&str> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut reopened_len = 0usize;

    for token in html_tokens(line) {
        let mut after = open.clone();
        match tag_name(token) {
            Some((name, true)) if after.last() == Some(&name) => {
                after.pop();
            }
            Some((name, false)) => after.push(name),
            _ => {}
        }
        let token_len = token.chars().count();

        if current_len > reopened_len && current_len + token_len + closing_len(&after) > limit {
            for name in open.iter().rev() {
                current.push_str(&format!("</{name}>"));
            }
            pieces.push(std::mem::take(&mut current));
            for name in &open {
                current.push_str(&format!("<{name}>"));
            }
            current_len = current.chars().count();
            reopened_len = current_len;
        }

        current.push_str(token);
        current_len += token_len;
        open = after;
    }
    if current_len > reopened_len {
        pieces.push(current);
    }
    pieces
}

/// Split text into tags, entities and single characters.
fn html_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(first) = rest.chars().next() {
        let end = match first {
            '<' => rest.find('>').map(|i| i + 1),
            '&' => rest
                .char_indices()
                .skip(1)
                .take(9)
                .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '#' || *c == ';')
                .find(|(_, c)| *c == ';')
                .map(|(i, _)| i + 1),
            _ => None,
        }
        .unwrap_or(first.len_utf8());
        let (token, tail) = rest.split_at(end);
        tokens.push(token);
        rest = tail;
    }
    tokens
}

/// Name of a tag token and whether it closes: `<b>` is `("b", false)`.
fn tag_name(token: &str) -> Option<(&str, bool)> {
    let inner = token.strip_prefix('<')?.strip_suffix('>')?;
    if inner.ends_with('/') {
        return None;
    }
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(inner) => (true, inner),
        None => (false, inner),
    };
    let name = inner.split_whitespace().next()?;
    Some((name, closing))
}

fn closing_len(open: &[&str]) -> usize {
    open.iter().map(|name| name.len() + 3).sum()
}
