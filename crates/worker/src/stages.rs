use anyhow::Context;
use chrono::NaiveDate;
use currency_core::artifacts::{self, DataPaths};
use currency_core::chart::render_forecast_chart;
use currency_core::config::Settings;
use currency_core::domain::rate::TRACKED_CURRENCIES;
use currency_core::feed::nbu::NbuClient;
use currency_core::feed::RateFeedClient;
use currency_core::forecast::{project, rolling_mean, ROLLING_WINDOW};
use currency_core::notify::{distribute, TelegramClient};
use currency_core::report::{write_reports, SummaryMap};
use currency_core::storage::rates::{fetch_history, upsert_rates_atomic};
use currency_core::{analytics, storage};
use std::path::PathBuf;

pub async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    storage::migrate(&pool).await?;
    Ok(pool)
}

/// Fetch the feed and persist it verbatim under the run date.
pub async fn fetch(
    settings: &Settings,
    paths: &DataPaths,
    run_date: NaiveDate,
) -> anyhow::Result<i64> {
    let client = NbuClient::from_settings(settings)?;
    let raw = client.fetch_daily_rates().await?;
    let entries = raw.as_array().map(|a| a.len()).unwrap_or(0) as i64;

    let path = artifacts::save_raw_snapshot(paths, run_date, &raw)?;
    tracing::info!(%run_date, entries, path = %path.display(), "raw snapshot saved");
    Ok(entries)
}

/// Project the most recent raw snapshot onto the tracked currency set and
/// write the processed artifact for the run date.
pub async fn normalize(paths: &DataPaths, run_date: NaiveDate) -> anyhow::Result<i64> {
    let Some((raw_date, raw)) = artifacts::latest_raw_snapshot(paths)? else {
        anyhow::bail!("no raw snapshot found; run the fetch stage first");
    };

    let outcome = currency_core::normalize::normalize(&raw)?;
    let path = artifacts::write_processed(paths, run_date, &outcome.records)?;
    tracing::info!(
        %run_date,
        %raw_date,
        records = outcome.records.len(),
        dropped = outcome.dropped,
        path = %path.display(),
        "processed artifact written"
    );
    Ok(outcome.records.len() as i64)
}

/// Merge the most recent processed artifact into the store.
pub async fn load(pool: &sqlx::PgPool, paths: &DataPaths) -> anyhow::Result<i64> {
    let Some((date, records)) = artifacts::latest_processed(paths)? else {
        anyhow::bail!("no processed artifact found; run the normalize stage first");
    };

    if records.is_empty() {
        tracing::warn!(%date, "processed artifact holds no tracked records; nothing to load");
        return Ok(0);
    }

    let affected = upsert_rates_atomic(pool, &records).await?;
    tracing::info!(%date, records = records.len(), affected, "loaded into exchange_rates");
    Ok(affected as i64)
}

/// Summarize each tracked currency against the live store and write the
/// dated report artifacts.
pub async fn analyze(
    pool: &sqlx::PgPool,
    paths: &DataPaths,
    run_date: NaiveDate,
) -> anyhow::Result<i64> {
    let mut summaries = SummaryMap::new();
    for cc in TRACKED_CURRENCIES {
        let summary = analytics::compute(pool, cc, run_date).await?;
        if summary.is_none() {
            tracing::warn!(cc, "no stored rates; reporting a placeholder");
        }
        summaries.insert(cc.to_string(), summary);
    }

    let num_currencies = storage::rates::count_distinct_currencies(pool).await?;
    let written = write_reports(paths, run_date, &summaries, num_currencies)?;
    tracing::info!(
        %run_date,
        structured = %written.structured.display(),
        narrative = %written.narrative.display(),
        "reports written"
    );

    Ok(summaries.values().filter(|s| s.is_some()).count() as i64)
}

/// Render the forecast chart per tracked currency, skipping currencies with
/// no history.
pub async fn forecast(pool: &sqlx::PgPool, paths: &DataPaths) -> anyhow::Result<i64> {
    let mut rendered = 0i64;
    for cc in TRACKED_CURRENCIES {
        let history = fetch_history(pool, cc).await?;
        let Some(series) = project(cc, &history) else {
            tracing::warn!(cc, "no stored rates; skipping forecast chart");
            continue;
        };

        let rates: Vec<f64> = history.iter().map(|r| r.rate).collect();
        let rolling = rolling_mean(&rates, ROLLING_WINDOW);

        let path = paths.chart_path(cc);
        render_forecast_chart(&path, cc, &history, &rolling, &series)?;
        tracing::info!(cc, path = %path.display(), "forecast chart rendered");
        rendered += 1;
    }
    Ok(rendered)
}

/// Fan the charts and narrative report out to every subscriber. Skips
/// delivery entirely when no bot token is configured.
pub async fn notify(
    pool: &sqlx::PgPool,
    settings: &Settings,
    paths: &DataPaths,
    run_date: NaiveDate,
) -> anyhow::Result<i64> {
    if settings.telegram_bot_token.is_none() {
        tracing::warn!("TELEGRAM_BOT_TOKEN not set; skipping delivery");
        return Ok(0);
    }

    let client = TelegramClient::from_settings(settings)?;
    let subscribers = storage::subscribers::list_subscribers(pool).await?;

    let charts: Vec<PathBuf> = TRACKED_CURRENCIES
        .iter()
        .map(|cc| paths.chart_path(cc))
        .collect();
    let narrative = paths.narrative_report_path(run_date);

    let stats = distribute(&client, &subscribers, &charts, Some(&narrative)).await?;
    Ok(stats.sent as i64)
}

/// Replay every raw snapshot on disk, in date order, into the store. Useful
/// after schema resets or when raw history was collected before the DB
/// existed.
pub async fn backfill(pool: &sqlx::PgPool, paths: &DataPaths) -> anyhow::Result<i64> {
    let dates = artifacts::raw_snapshot_dates(paths)?;
    anyhow::ensure!(!dates.is_empty(), "no raw snapshots found; nothing to backfill");

    let mut total = 0i64;
    for date in dates {
        let raw = artifacts::read_raw_snapshot(paths, date)?;
        let outcome = currency_core::normalize::normalize(&raw)
            .with_context(|| format!("normalize failed for snapshot {date}"))?;

        artifacts::write_processed(paths, date, &outcome.records)?;
        if outcome.records.is_empty() {
            tracing::warn!(%date, "snapshot holds no tracked records; skipping load");
            continue;
        }

        let affected = upsert_rates_atomic(pool, &outcome.records).await?;
        tracing::info!(%date, affected, dropped = outcome.dropped, "snapshot replayed");
        total += affected as i64;
    }
    Ok(total)
}
