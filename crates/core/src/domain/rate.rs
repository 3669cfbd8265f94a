use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Currencies retained by the pipeline. Everything else in the feed is
/// projected away at normalization time.
pub const TRACKED_CURRENCIES: [&str; 2] = ["USD", "EUR"];

pub fn is_tracked(cc: &str) -> bool {
    TRACKED_CURRENCIES.contains(&cc)
}

/// One element of the upstream NBU feed array, as delivered.
/// `exchangedate` is in the feed's `dd.mm.yyyy` format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub cc: String,
    pub txt: String,
    pub rate: f64,
    pub exchangedate: String,
}

/// A normalized rate observation. `(cc, exchange_date)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub cc: String,
    pub txt: String,
    pub rate: f64,
    pub rate_per_100: f64,
    pub exchange_date: NaiveDate,
}
