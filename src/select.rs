//! Pick the IPOs worth applying to and rank them.
//!
//! Filtering keeps page order. Ranking never reorders the records; it
//! returns a separate list of [`RankedEntry`] values pointing back into the
//! selected records.

use crate::models::{IpoRecord, Money};
use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info, instrument};

const SIZE_WEIGHT: f64 = 0.7;
const GMP_WEIGHT: f64 = 0.3;

/// Filters applied before a record is reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub exclude_sme: bool,
    pub exclude_withdrawn: bool,
    /// Issue size must be strictly above this many crores.
    pub min_issue_size_cr: f64,
    /// GMP must be strictly above this amount.
    pub min_gmp: Money,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            exclude_sme: true,
            exclude_withdrawn: true,
            min_issue_size_cr: 400.0,
            min_gmp: Money::from_paise(850),
        }
    }
}

impl Selection {
    /// Why `record` is filtered out, or `None` if it is kept.
    ///
    /// Bidding must still be possible on `today`, so a known close date on or
    /// after it is required.
    pub fn rejection(&self, record: &IpoRecord, today: NaiveDate) -> Option<&'static str> {
        if self.exclude_sme && record.is_sme {
            return Some("sme");
        }
        if self.exclude_withdrawn && record.listing_withdrawn {
            return Some("withdrawn");
        }
        match record.close_date {
            None => return Some("no close date"),
            Some(close) if close < today => return Some("closed"),
            Some(_) => {}
        }
        if !record.issue_size_cr.is_some_and(|size| size > self.min_issue_size_cr) {
            return Some("issue size");
        }
        if !record.gmp.is_some_and(|gmp| gmp > self.min_gmp) {
            return Some("gmp");
        }
        None
    }

    /// Keep the records that pass every filter, in their original order.
    #[instrument(level = "info", skip_all, fields(%today))]
    pub fn apply(&self, records: Vec<IpoRecord>, today: NaiveDate) -> Vec<IpoRecord> {
        let total = records.len();
        let selected: Vec<IpoRecord> = records
            .into_iter()
            .filter(|record| match self.rejection(record, today) {
                Some(reason) => {
                    debug!(name = %record.name, reason, "Filtered out");
                    false
                }
                None => true,
            })
            .collect();
        info!(total, selected = selected.len(), "Applied selection filters");
        selected
    }
}

/// Position of a record in the suggested application order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedEntry {
    /// 1-based rank.
    pub rank: usize,
    /// Index into the record slice that was ranked.
    pub index: usize,
    pub score: f64,
}

/// Rank records by `0.7 × relative issue size + 0.3 × relative GMP`.
///
/// Each term is the record's value divided by the largest value in the
/// slice. A missing value, or a slice whose largest value is not positive,
/// contributes nothing.
///
/// # Arguments
///
/// * `records` - Selected records, in page order
///
/// # Returns
///
/// One [`RankedEntry`] per record, best score first. Equal scores keep page
/// order; `records` itself is left untouched.
pub fn apply_order(records: &[IpoRecord]) -> Vec<RankedEntry> {
    let max_size = records
        .iter()
        .filter_map(|r| r.issue_size_cr)
        .fold(0.0_f64, f64::max);
    let max_gmp = records
        .iter()
        .filter_map(|r| r.gmp.map(Money::as_rupees_f64))
        .fold(0.0_f64, f64::max);

    let relative = |value: Option<f64>, max: f64| match value {
        Some(v) if max > 0.0 => v / max,
        _ => 0.0,
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let score = SIZE_WEIGHT * relative(record.issue_size_cr, max_size)
                + GMP_WEIGHT * relative(record.gmp.map(Money::as_rupees_f64), max_gmp);
            (index, score)
        })
        .sorted_by(|a, b| b.1.total_cmp(&a.1))
        .enumerate()
        .map(|(position, (index, score))| RankedEntry {
            rank: position + 1,
            index,
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()
    }

    fn record(name: &str, size: f64, gmp: i64, close_day: u32) -> IpoRecord {
        IpoRecord {
            issue_size_cr: Some(size),
            gmp: Some(Money::from_rupees(gmp)),
            close_date: NaiveDate::from_ymd_opt(2025, 10, close_day),
            ..IpoRecord::named(name)
        }
    }

    #[test]
    fn test_default_thresholds() {
        let s = Selection::default();
        assert_eq!(s.rejection(&record("Keep", 1200.0, 45, 28), today()), None);
        assert_eq!(s.rejection(&record("Today", 1200.0, 45, 20), today()), None);
        assert_eq!(s.rejection(&record("Past", 1200.0, 45, 15), today()), Some("closed"));
        assert_eq!(s.rejection(&record("Small", 400.0, 45, 28), today()), Some("issue size"));
        assert_eq!(s.rejection(&record("Thin", 1200.0, 8, 28), today()), Some("gmp"));

        let mut sme = record("Tiny SME", 1200.0, 45, 28);
        sme.is_sme = true;
        assert_eq!(s.rejection(&sme, today()), Some("sme"));

        let mut withdrawn = record("Pulled", 1200.0, 45, 28);
        withdrawn.listing_withdrawn = true;
        assert_eq!(s.rejection(&withdrawn, today()), Some("withdrawn"));
    }

    #[test]
    fn test_gmp_threshold_is_strict() {
        let s = Selection::default();
        let mut edge = record("Edge", 1200.0, 0, 28);
        edge.gmp = Some(Money::from_paise(850));
        assert_eq!(s.rejection(&edge, today()), Some("gmp"));
        edge.gmp = Some(Money::from_paise(851));
        assert_eq!(s.rejection(&edge, today()), None);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let s = Selection::default();
        let mut no_gmp = record("No GMP", 1200.0, 45, 28);
        no_gmp.gmp = None;
        assert_eq!(s.rejection(&no_gmp, today()), Some("gmp"));

        let mut no_close = record("No close", 1200.0, 45, 28);
        no_close.close_date = None;
        assert_eq!(s.rejection(&no_close, today()), Some("no close date"));
    }

    #[test]
    fn test_apply_keeps_order() {
        let records = vec![
            record("First", 500.0, 20, 28),
            record("Dropped", 100.0, 20, 28),
            record("Second", 5000.0, 200, 25),
        ];
        let names: Vec<String> = Selection::default()
            .apply(records, today())
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_apply_order_weights() {
        let records = vec![record("Alpha", 1200.0, 45, 28), record("Gamma", 5430.0, 120, 21)];
        let ranking = apply_order(&records);

        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[0].index, 1);
        assert!((ranking[0].score - 1.0).abs() < 1e-9);

        let expected = 0.7 * (1200.0 / 5430.0) + 0.3 * (45.0 / 120.0);
        assert_eq!(ranking[1].index, 0);
        assert!((ranking[1].score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_apply_order_ties_keep_page_order() {
        let records = vec![record("A", 1000.0, 50, 28), record("B", 1000.0, 50, 28)];
        let order: Vec<usize> = apply_order(&records).iter().map(|e| e.index).collect();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_apply_order_missing_values_score_zero() {
        let mut bare = IpoRecord::named("Bare");
        bare.gmp = Some(Money::from_rupees(-5));
        let records = vec![bare, record("Full", 800.0, 30, 28)];
        let ranking = apply_order(&records);
        assert_eq!(ranking[0].index, 1);
        assert!(ranking[1].score <= 0.0);
    }

    #[test]
    fn test_apply_order_empty() {
        assert!(apply_order(&[]).is_empty());
    }
}
