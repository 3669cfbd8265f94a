use crate::domain::rate::{is_tracked, FeedEntry, RateRecord};
use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;

const FEED_DATE_FORMAT: &str = "%d.%m.%Y";

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub records: Vec<RateRecord>,
    /// Feed entries that failed to parse (shape, rate or date). Dropped, not fatal.
    pub dropped: usize,
}

/// Projects the raw feed payload onto the tracked currency set.
///
/// Entries that fail to decode or carry an unparseable date are dropped and
/// counted. Untracked currencies are filtered out silently; that is
/// projection, not data loss. Feed order is preserved.
pub fn normalize(raw: &Value) -> Result<NormalizeOutcome> {
    let entries = raw
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("feed payload is not a JSON array"))?;

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for entry in entries {
        let entry = match serde_json::from_value::<FeedEntry>(entry.clone()) {
            Ok(e) => e,
            Err(err) => {
                dropped += 1;
                tracing::debug!(error = %err, "dropping malformed feed entry");
                continue;
            }
        };

        let exchange_date = match NaiveDate::parse_from_str(&entry.exchangedate, FEED_DATE_FORMAT) {
            Ok(d) => d,
            Err(err) => {
                dropped += 1;
                tracing::debug!(cc = %entry.cc, raw_date = %entry.exchangedate, error = %err, "dropping entry with unparseable date");
                continue;
            }
        };

        if !is_tracked(&entry.cc) {
            continue;
        }

        records.push(RateRecord {
            rate_per_100: entry.rate * 100.0,
            cc: entry.cc,
            txt: entry.txt,
            rate: entry.rate,
            exchange_date,
        });
    }

    if dropped > 0 {
        tracing::warn!(dropped, "feed entries dropped during normalization");
    }

    Ok(NormalizeOutcome { records, dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_only_tracked_currencies() {
        let raw = json!([
            {"cc": "USD", "rate": 41.0, "txt": "US Dollar", "exchangedate": "01.01.2025"},
            {"cc": "XYZ", "rate": 1.0, "txt": "Imaginary", "exchangedate": "01.01.2025"}
        ]);

        let out = normalize(&raw).unwrap();
        assert_eq!(out.dropped, 0);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].cc, "USD");
        assert_eq!(out.records[0].rate_per_100, 4100.0);
        assert_eq!(
            out.records[0].exchange_date,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[test]
    fn drops_and_counts_malformed_entries() {
        let raw = json!([
            {"cc": "USD", "rate": 41.0, "txt": "US Dollar", "exchangedate": "01.01.2025"},
            {"cc": "EUR", "rate": 45.5, "txt": "Euro", "exchangedate": "not-a-date"},
            {"cc": "EUR", "txt": "Euro", "exchangedate": "01.01.2025"},
            {"cc": "EUR", "rate": "45.5", "txt": "Euro", "exchangedate": "01.01.2025"}
        ]);

        let out = normalize(&raw).unwrap();
        assert_eq!(out.dropped, 3);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].cc, "USD");
    }

    #[test]
    fn preserves_feed_order_per_currency() {
        let raw = json!([
            {"cc": "USD", "rate": 41.0, "txt": "US Dollar", "exchangedate": "01.01.2025"},
            {"cc": "EUR", "rate": 45.0, "txt": "Euro", "exchangedate": "01.01.2025"},
            {"cc": "USD", "rate": 42.0, "txt": "US Dollar", "exchangedate": "02.01.2025"}
        ]);

        let out = normalize(&raw).unwrap();
        let usd: Vec<f64> = out
            .records
            .iter()
            .filter(|r| r.cc == "USD")
            .map(|r| r.rate)
            .collect();
        assert_eq!(usd, vec![41.0, 42.0]);
    }

    #[test]
    fn rejects_non_array_payload() {
        let raw = json!({"cc": "USD"});
        assert!(normalize(&raw).is_err());
    }
}
