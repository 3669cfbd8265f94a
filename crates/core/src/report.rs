use crate::analytics::{CurrencySummary, RANGE_WINDOW_DAYS};
use crate::artifacts::DataPaths;
use crate::domain::rate::TRACKED_CURRENCIES;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Summaries keyed by currency code. `None` means the store holds no rows
/// for that currency yet.
pub type SummaryMap = BTreeMap<String, Option<CurrencySummary>>;

/// One flat row of the per-currency tabular report.
#[derive(Debug, Serialize)]
struct TabularRow {
    last: Option<f64>,
    last_date: Option<NaiveDate>,
    change_month: Option<f64>,
    change_days: Option<i64>,
    min_year: Option<f64>,
    max_year: Option<f64>,
    avg_all_time: Option<f64>,
    days: u64,
}

#[derive(Debug)]
pub struct WrittenReports {
    pub structured: PathBuf,
    pub tabular: Vec<PathBuf>,
    pub narrative: PathBuf,
}

/// Nested mapping keyed by currency then metric. Dates are rendered as
/// ISO-8601 strings, numerics as JSON numbers.
pub fn structured_json(summaries: &SummaryMap, num_currencies: i64) -> Value {
    let mut out = serde_json::Map::new();

    for cc in ordered_currencies(summaries) {
        let entry = match summaries.get(cc).and_then(|s| s.as_ref()) {
            Some(s) => json!({
                "last": s.last_rate,
                "last_date": s.last_date.to_string(),
                "first_date": s.first_date.to_string(),
                "change_month": s.change.diff,
                "change_days": s.change.actual_days,
                "range_year": s.range.as_ref().map(|r| json!({"min": r.min, "max": r.max})).unwrap_or_else(|| json!({})),
                "avg_all_time": s.avg_all_time,
                "days": s.sample_count,
            }),
            None => json!({
                "last": Value::Null,
                "last_date": Value::Null,
                "first_date": Value::Null,
                "change_month": 0.0,
                "change_days": 0,
                "range_year": {},
                "avg_all_time": Value::Null,
                "days": 0,
            }),
        };
        out.insert(cc.to_lowercase(), entry);
    }

    out.insert("general".into(), json!({ "num_currencies": num_currencies }));
    Value::Object(out)
}

/// The human-readable report: current rate per currency, capped-window change
/// per currency, capped-window range per currency, then the distinct-currency
/// count. A currency with no stored rows renders placeholder lines.
pub fn narrative_lines(summaries: &SummaryMap, num_currencies: i64) -> Vec<String> {
    let ordered = ordered_currencies(summaries);
    let mut lines = Vec::new();

    for cc in &ordered {
        match summaries.get(*cc).and_then(|s| s.as_ref()) {
            Some(s) => lines.push(format!(
                "{} Current {cc} rate: {:.2} UAH",
                currency_emoji(cc),
                s.last_rate
            )),
            None => lines.push(format!("{} No data for {cc} yet", currency_emoji(cc))),
        }
    }

    for cc in &ordered {
        match summaries.get(*cc).and_then(|s| s.as_ref()) {
            Some(s) => lines.push(format!(
                "📈 {cc} change in {} days: {:+.2} UAH",
                s.change.actual_days, s.change.diff
            )),
            None => lines.push(format!("📈 No data for {cc} yet")),
        }
    }

    for cc in &ordered {
        lines.push(range_line(cc, summaries.get(*cc).and_then(|s| s.as_ref())));
    }

    lines.push(format!("💱 The database tracks {num_currencies} currencies"));
    lines
}

fn range_line(cc: &str, summary: Option<&CurrencySummary>) -> String {
    let Some(s) = summary else {
        return format!("📊 No data for {cc} yet");
    };
    let Some(range) = &s.range else {
        return format!("📊 No data for {cc} yet");
    };

    if (s.sample_count as i64) < RANGE_WINDOW_DAYS {
        format!(
            "📊 {cc} in {} days fluctuated from {:.2} to {:.2} UAH",
            s.sample_count, range.min, range.max
        )
    } else {
        format!(
            "📊 {cc} per year fluctuated from {:.2} to {:.2} UAH",
            range.min, range.max
        )
    }
}

/// Writes the dated report artifacts: one structured JSON file, one tabular
/// CSV per currency plus a general one, and the narrative text file. All are
/// derived from the summaries alone.
pub fn write_reports(
    paths: &DataPaths,
    date: NaiveDate,
    summaries: &SummaryMap,
    num_currencies: i64,
) -> Result<WrittenReports> {
    fs::create_dir_all(&paths.reports)
        .with_context(|| format!("failed to create {}", paths.reports.display()))?;

    let structured = paths.reports.join(format!("report_{date}.json"));
    let body = serde_json::to_string_pretty(&structured_json(summaries, num_currencies))
        .context("failed to serialize structured report")?;
    fs::write(&structured, body)
        .with_context(|| format!("failed to write {}", structured.display()))?;

    let mut tabular = Vec::new();
    for cc in ordered_currencies(summaries) {
        let path = paths
            .reports
            .join(format!("{}_report_{date}.csv", cc.to_lowercase()));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to open {} for writing", path.display()))?;
        writer
            .serialize(tabular_row(summaries.get(cc).and_then(|s| s.as_ref())))
            .context("failed to write tabular row")?;
        writer.flush().context("failed to flush tabular report")?;
        tabular.push(path);
    }

    let general = paths.reports.join(format!("general_report_{date}.csv"));
    {
        let mut writer = csv::Writer::from_path(&general)
            .with_context(|| format!("failed to open {} for writing", general.display()))?;
        writer.write_record(["num_currencies"])?;
        writer.write_record([num_currencies.to_string()])?;
        writer.flush().context("failed to flush general report")?;
    }
    tabular.push(general);

    let narrative = paths.narrative_report_path(date);
    fs::write(&narrative, narrative_lines(summaries, num_currencies).join("\n"))
        .with_context(|| format!("failed to write {}", narrative.display()))?;

    Ok(WrittenReports {
        structured,
        tabular,
        narrative,
    })
}

fn tabular_row(summary: Option<&CurrencySummary>) -> TabularRow {
    match summary {
        Some(s) => TabularRow {
            last: Some(s.last_rate),
            last_date: Some(s.last_date),
            change_month: Some(s.change.diff),
            change_days: Some(s.change.actual_days),
            min_year: s.range.as_ref().map(|r| r.min),
            max_year: s.range.as_ref().map(|r| r.max),
            avg_all_time: Some(s.avg_all_time),
            days: s.sample_count as u64,
        },
        None => TabularRow {
            last: None,
            last_date: None,
            change_month: None,
            change_days: None,
            min_year: None,
            max_year: None,
            avg_all_time: None,
            days: 0,
        },
    }
}

/// Tracked currencies first, in their declared order, then anything else the
/// map happens to contain.
fn ordered_currencies(summaries: &SummaryMap) -> Vec<&str> {
    let mut out: Vec<&str> = TRACKED_CURRENCIES
        .iter()
        .copied()
        .filter(|cc| summaries.contains_key(*cc))
        .collect();
    for cc in summaries.keys() {
        if !TRACKED_CURRENCIES.contains(&cc.as_str()) {
            out.push(cc);
        }
    }
    out
}

fn currency_emoji(cc: &str) -> &'static str {
    match cc {
        "USD" => "💵",
        "EUR" => "💶",
        _ => "💱",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{RateChange, RateRange};

    fn summary(cc: &str, last: f64, actual_days: i64, range: Option<(f64, f64)>) -> CurrencySummary {
        CurrencySummary {
            cc: cc.into(),
            last_rate: last,
            last_date: "2025-05-17".parse().unwrap(),
            first_date: "2025-05-01".parse().unwrap(),
            sample_count: actual_days as usize,
            avg_all_time: last,
            change: RateChange {
                diff: 1.5,
                actual_days,
                nominal_days: 30,
            },
            range: range.map(|(min, max)| RateRange { min, max }),
        }
    }

    fn map(entries: Vec<(&str, Option<CurrencySummary>)>) -> SummaryMap {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn narrative_shows_actual_window_in_change_label() {
        let summaries = map(vec![
            ("USD", Some(summary("USD", 43.5, 17, Some((40.0, 43.5))))),
            ("EUR", Some(summary("EUR", 45.0, 17, Some((44.0, 46.0))))),
        ]);

        let lines = narrative_lines(&summaries, 2);
        assert_eq!(lines[0], "💵 Current USD rate: 43.50 UAH");
        assert_eq!(lines[1], "💶 Current EUR rate: 45.00 UAH");
        assert_eq!(lines[2], "📈 USD change in 17 days: +1.50 UAH");
        assert_eq!(lines[4], "📊 USD in 17 days fluctuated from 40.00 to 43.50 UAH");
        assert_eq!(lines[6], "💱 The database tracks 2 currencies");
    }

    #[test]
    fn narrative_degrades_to_placeholders_without_data() {
        let summaries = map(vec![
            ("USD", Some(summary("USD", 43.5, 17, Some((40.0, 43.5))))),
            ("EUR", None),
        ]);

        let lines = narrative_lines(&summaries, 1);
        assert!(lines.contains(&"💶 No data for EUR yet".to_string()));
        assert!(lines.contains(&"📈 No data for EUR yet".to_string()));
        assert!(lines.contains(&"📊 No data for EUR yet".to_string()));
    }

    #[test]
    fn narrative_uses_yearly_phrasing_for_full_window() {
        let mut s = summary("USD", 41.0, 30, Some((38.0, 43.0)));
        s.sample_count = 400;
        let summaries = map(vec![("USD", Some(s))]);

        let lines = narrative_lines(&summaries, 1);
        assert!(lines
            .iter()
            .any(|l| l == "📊 USD per year fluctuated from 38.00 to 43.00 UAH"));
    }

    #[test]
    fn structured_json_is_keyed_by_currency_then_metric() {
        let summaries = map(vec![
            ("USD", Some(summary("USD", 43.5, 17, Some((40.0, 43.5))))),
            ("EUR", None),
        ]);

        let v = structured_json(&summaries, 2);
        assert_eq!(v["usd"]["last"], 43.5);
        assert_eq!(v["usd"]["last_date"], "2025-05-17");
        assert_eq!(v["usd"]["range_year"]["min"], 40.0);
        assert_eq!(v["eur"]["last"], Value::Null);
        assert_eq!(v["eur"]["days"], 0);
        assert_eq!(v["general"]["num_currencies"], 2);
    }

    #[test]
    fn writes_all_report_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(tmp.path());
        let date: NaiveDate = "2025-05-17".parse().unwrap();

        let summaries = map(vec![
            ("USD", Some(summary("USD", 43.5, 17, Some((40.0, 43.5))))),
            ("EUR", None),
        ]);

        let written = write_reports(&paths, date, &summaries, 2).unwrap();
        assert!(written.structured.ends_with("report_2025-05-17.json"));
        assert!(written.narrative.ends_with("report_2025-05-17.txt"));
        assert_eq!(written.tabular.len(), 3);
        for path in written
            .tabular
            .iter()
            .chain([&written.structured, &written.narrative])
        {
            assert!(path.is_file(), "{} should exist", path.display());
        }

        let narrative = fs::read_to_string(&written.narrative).unwrap();
        assert!(narrative.contains("No data for EUR yet"));
    }
}
