use crate::domain::rate::RateRecord;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const RAW_FILE: &str = "response.json";
const PROCESSED_FILE: &str = "rates.csv";

/// On-disk layout for pipeline artifacts, rooted at the configured data dir.
/// Raw and processed artifacts are partitioned into one `YYYY-MM-DD`
/// directory per run day.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub raw: PathBuf,
    pub processed: PathBuf,
    pub reports: PathBuf,
    pub charts: PathBuf,
}

impl DataPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            raw: root.join("raw"),
            processed: root.join("processed"),
            reports: root.join("reports"),
            charts: root.join("charts"),
        }
    }

    pub fn chart_path(&self, cc: &str) -> PathBuf {
        self.charts.join(format!("forecast_{cc}.png"))
    }

    pub fn narrative_report_path(&self, date: NaiveDate) -> PathBuf {
        self.reports.join(format!("report_{date}.txt"))
    }
}

/// Writes the verbatim upstream payload for `date`. Overwrites on a same-day
/// re-run (last write wins).
pub fn save_raw_snapshot(paths: &DataPaths, date: NaiveDate, raw: &Value) -> Result<PathBuf> {
    let dir = paths.raw.join(date.to_string());
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let path = dir.join(RAW_FILE);
    let body = serde_json::to_string_pretty(raw).context("failed to serialize raw payload")?;
    fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn read_raw_snapshot(paths: &DataPaths, date: NaiveDate) -> Result<Value> {
    let path = paths.raw.join(date.to_string()).join(RAW_FILE);
    let body =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// All dates with a raw snapshot on disk, ascending.
pub fn raw_snapshot_dates(paths: &DataPaths) -> Result<Vec<NaiveDate>> {
    dated_subdirs(&paths.raw, RAW_FILE)
}

/// The most recently dated raw snapshot, or `None` if the fetch stage has
/// never run.
pub fn latest_raw_snapshot(paths: &DataPaths) -> Result<Option<(NaiveDate, Value)>> {
    let Some(date) = dated_subdirs(&paths.raw, RAW_FILE)?.pop() else {
        return Ok(None);
    };
    Ok(Some((date, read_raw_snapshot(paths, date)?)))
}

/// Writes the normalized records for `date` as a CSV artifact.
pub fn write_processed(paths: &DataPaths, date: NaiveDate, records: &[RateRecord]) -> Result<PathBuf> {
    let dir = paths.processed.join(date.to_string());
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let path = dir.join(PROCESSED_FILE);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to open {} for writing", path.display()))?;
    for record in records {
        writer.serialize(record).context("failed to write record")?;
    }
    writer.flush().context("failed to flush processed csv")?;
    Ok(path)
}

pub fn read_processed(paths: &DataPaths, date: NaiveDate) -> Result<Vec<RateRecord>> {
    let path = paths.processed.join(date.to_string()).join(PROCESSED_FILE);
    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut records = Vec::new();
    for row in reader.deserialize::<RateRecord>() {
        records.push(row.with_context(|| format!("malformed row in {}", path.display()))?);
    }
    Ok(records)
}

/// The most recently dated processed artifact, or `None` if the normalize
/// stage has never run.
pub fn latest_processed(paths: &DataPaths) -> Result<Option<(NaiveDate, Vec<RateRecord>)>> {
    let Some(date) = dated_subdirs(&paths.processed, PROCESSED_FILE)?.pop() else {
        return Ok(None);
    };
    Ok(Some((date, read_processed(paths, date)?)))
}

fn dated_subdirs(root: &Path, expected_file: &str) -> Result<Vec<NaiveDate>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut dates = Vec::new();
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to list {}", root.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", root.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Ok(date) = name.parse::<NaiveDate>() else {
            continue;
        };
        if entry.path().join(expected_file).is_file() {
            dates.push(date);
        }
    }

    dates.sort();
    Ok(dates)
}
