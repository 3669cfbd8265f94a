use crate::storage::rates::{fetch_history, RateRow};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

pub const CHANGE_WINDOW_DAYS: i64 = 30;
pub const RANGE_WINDOW_DAYS: i64 = 365;

/// Rate movement over the trailing change window. When fewer samples exist
/// than the nominal window, the comparison is capped to the oldest available
/// sample and `actual_days` records the window actually used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateChange {
    pub diff: f64,
    pub actual_days: i64,
    pub nominal_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRange {
    pub min: f64,
    pub max: f64,
}

/// Per-currency summary derived from the live store on every run. Ephemeral;
/// persisted only as dated report artifacts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencySummary {
    pub cc: String,
    pub last_rate: f64,
    pub last_date: NaiveDate,
    pub first_date: NaiveDate,
    pub sample_count: usize,
    pub avg_all_time: f64,
    pub change: RateChange,
    /// Min/max over the trailing range window; `None` when no row falls
    /// inside it.
    pub range: Option<RateRange>,
}

pub async fn compute(
    pool: &sqlx::PgPool,
    cc: &str,
    as_of: NaiveDate,
) -> anyhow::Result<Option<CurrencySummary>> {
    let rows = fetch_history(pool, cc).await?;
    Ok(summarize(cc, &rows, as_of))
}

/// Aggregates one currency's history into a summary. Pure function over rows
/// already fetched from the store; returns `None` when the currency has no
/// rows at all.
///
/// The change metric is rank-based, not calendar-based: the latest rate is
/// compared against the rate at descending rank `min(sample_count, 31)`.
/// Feed days are not guaranteed contiguous, so under sparse history this
/// compares against the 31st *available* sample.
pub fn summarize(cc: &str, rows: &[RateRow], as_of: NaiveDate) -> Option<CurrencySummary> {
    if rows.is_empty() {
        return None;
    }

    let mut rows: Vec<&RateRow> = rows.iter().collect();
    rows.sort_by_key(|r| r.exchangedate);

    let n = rows.len();
    let last = rows[n - 1];
    let first = rows[0];

    let avg_all_time = rows.iter().map(|r| r.rate).sum::<f64>() / n as f64;

    let compare_rank = n.min((CHANGE_WINDOW_DAYS + 1) as usize);
    let compare_row = rows[n - compare_rank];
    let change = RateChange {
        diff: last.rate - compare_row.rate,
        actual_days: (n as i64).min(CHANGE_WINDOW_DAYS),
        nominal_days: CHANGE_WINDOW_DAYS,
    };

    let window_start = as_of - Duration::days(RANGE_WINDOW_DAYS);
    let in_window: Vec<f64> = rows
        .iter()
        .filter(|r| r.exchangedate >= window_start)
        .map(|r| r.rate)
        .collect();
    let range = if in_window.is_empty() {
        None
    } else {
        Some(RateRange {
            min: in_window.iter().copied().fold(f64::INFINITY, f64::min),
            max: in_window.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    };

    Some(CurrencySummary {
        cc: cc.to_string(),
        last_rate: last.rate,
        last_date: last.exchangedate,
        first_date: first.exchangedate,
        sample_count: n,
        avg_all_time,
        change,
        range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cc: &str, date: &str, rate: f64) -> RateRow {
        RateRow {
            cc: cc.into(),
            txt: String::new(),
            rate,
            rate_per_100: rate * 100.0,
            exchangedate: date.parse().unwrap(),
        }
    }

    fn daily_rows(start: &str, rates: &[f64]) -> Vec<RateRow> {
        let start: NaiveDate = start.parse().unwrap();
        rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RateRow {
                cc: "USD".into(),
                txt: String::new(),
                rate: r,
                rate_per_100: r * 100.0,
                exchangedate: start + Duration::days(i as i64),
            })
            .collect()
    }

    #[test]
    fn empty_history_yields_none() {
        let as_of = "2025-06-01".parse().unwrap();
        assert!(summarize("EUR", &[], as_of).is_none());
    }

    #[test]
    fn basic_metrics_over_short_history() {
        let rows = daily_rows("2025-05-01", &[40.0, 41.0, 42.0]);
        let as_of = "2025-05-03".parse().unwrap();
        let s = summarize("USD", &rows, as_of).unwrap();

        assert_eq!(s.sample_count, 3);
        assert_eq!(s.last_rate, 42.0);
        assert_eq!(s.last_date, "2025-05-03".parse().unwrap());
        assert_eq!(s.first_date, "2025-05-01".parse().unwrap());
        assert!((s.avg_all_time - 41.0).abs() < 1e-9);
    }

    #[test]
    fn change_window_caps_to_oldest_available_sample() {
        // 17 samples < 31: compare against the oldest, label 17 days.
        let mut rates = vec![40.0; 16];
        rates.push(43.5);
        let rows = daily_rows("2025-05-01", &rates);
        let as_of = "2025-05-17".parse().unwrap();

        let s = summarize("USD", &rows, as_of).unwrap();
        assert!((s.change.diff - 3.5).abs() < 1e-9);
        assert_eq!(s.change.actual_days, 17);
        assert_eq!(s.change.nominal_days, 30);
    }

    #[test]
    fn change_window_uses_rank_31_when_history_is_long() {
        // 40 samples: rank 31 (descending) is index 40 - 31 = 9 ascending.
        let rates: Vec<f64> = (0..40).map(|i| 40.0 + i as f64 * 0.1).collect();
        let rows = daily_rows("2025-01-01", &rates);
        let as_of = "2025-02-09".parse().unwrap();

        let s = summarize("USD", &rows, as_of).unwrap();
        let expected = rates[39] - rates[9];
        assert!((s.change.diff - expected).abs() < 1e-9);
        assert_eq!(s.change.actual_days, 30);
    }

    #[test]
    fn change_rank_ignores_calendar_gaps() {
        // Two samples 90 days apart still compare rank 1 vs rank 2.
        let rows = vec![row("USD", "2025-01-01", 40.0), row("USD", "2025-04-01", 44.0)];
        let as_of = "2025-04-01".parse().unwrap();

        let s = summarize("USD", &rows, as_of).unwrap();
        assert!((s.change.diff - 4.0).abs() < 1e-9);
        assert_eq!(s.change.actual_days, 2);
    }

    #[test]
    fn range_excludes_rows_outside_window() {
        let rows = vec![
            row("USD", "2020-01-01", 25.0),
            row("USD", "2025-05-01", 41.0),
            row("USD", "2025-05-02", 42.0),
        ];
        let as_of = "2025-05-02".parse().unwrap();

        let s = summarize("USD", &rows, as_of).unwrap();
        let range = s.range.unwrap();
        assert_eq!(range.min, 41.0);
        assert_eq!(range.max, 42.0);
    }

    #[test]
    fn range_is_none_when_all_rows_are_stale() {
        let rows = vec![row("USD", "2020-01-01", 25.0)];
        let as_of = "2025-05-02".parse().unwrap();

        let s = summarize("USD", &rows, as_of).unwrap();
        assert!(s.range.is_none());
        assert_eq!(s.sample_count, 1);
    }

    #[test]
    fn tolerates_unsorted_input() {
        let rows = vec![
            row("USD", "2025-05-02", 42.0),
            row("USD", "2025-05-01", 41.0),
        ];
        let as_of = "2025-05-02".parse().unwrap();

        let s = summarize("USD", &rows, as_of).unwrap();
        assert_eq!(s.last_rate, 42.0);
        assert!((s.change.diff - 1.0).abs() < 1e-9);
    }
}
