//! Small helpers for run labelling, logging and message text.
//!
//! - Edition naming for the two daily runs
//! - String truncation for log output
//! - HTML escaping for Telegram's HTML parse mode

use chrono::NaiveTime;
use tracing::instrument;

/// Name the daily slot a run belongs to.
///
/// The report goes out twice a day. Runs before noon are the
/// **Morning** edition; the rest are the **Evening** edition.
///
/// # Returns
///
/// `"Morning"` or `"Evening"`.
#[instrument]
pub fn edition_label(time: NaiveTime) -> &'static str {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
    let which = if time < noon { "Morning" } else { "Evening" };
    tracing::debug!(%time, %which, "Computed edition label");
    which
}

/// Truncate a string for logging purposes.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// `s` unchanged if it fits, otherwise its first `max` bytes (backed off to
/// a character boundary) with `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Capitalize the first character of a string.
///
/// Used to tidy operator-supplied run labels ("morning" -> "Morning").
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}
