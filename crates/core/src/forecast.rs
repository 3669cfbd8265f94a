use crate::storage::rates::RateRow;
use chrono::{Duration, NaiveDate};

pub const ROLLING_WINDOW: usize = 7;
pub const HORIZON_DAYS: usize = 5;

/// A flat short-horizon projection: the last trailing rolling mean repeated
/// across consecutive future dates. Explicitly not a trend extrapolation.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    pub cc: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// Trailing rolling mean with a minimum of one sample, so the series is
/// defined at every index of a non-empty input.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window >= 1, "window must be >= 1");
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Projects `HORIZON_DAYS` future points for one currency from its history,
/// ordered ascending by exchange date. `None` when the currency has no rows.
pub fn project(cc: &str, rows: &[RateRow]) -> Option<ForecastSeries> {
    let last = rows.last()?;

    let rates: Vec<f64> = rows.iter().map(|r| r.rate).collect();
    let value = rolling_mean(&rates, ROLLING_WINDOW)
        .last()
        .copied()
        .unwrap_or(last.rate);

    let points = (1..=HORIZON_DAYS as i64)
        .map(|i| (last.exchangedate + Duration::days(i), value))
        .collect();

    Some(ForecastSeries {
        cc: cc.to_string(),
        points,
    })
}
