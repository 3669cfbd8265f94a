use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use currency_core::artifacts::DataPaths;
use currency_core::config::Settings;
use currency_core::storage;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod stages;

#[derive(Debug, Parser)]
#[command(name = "currency_worker")]
struct Args {
    /// Run date (YYYY-MM-DD). Defaults to today's UTC date.
    #[arg(long)]
    date: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch today's NBU feed and persist the raw snapshot.
    Fetch,
    /// Normalize the latest raw snapshot into the processed artifact.
    Normalize,
    /// Upsert the latest processed artifact into the store.
    Load,
    /// Compute per-currency summaries and write the dated reports.
    Analyze,
    /// Render per-currency forecast charts.
    Forecast,
    /// Deliver charts and the narrative report to subscribers.
    Notify,
    /// Execute every stage in order under a per-date advisory lock.
    Run,
    /// Replay every raw snapshot on disk into the store.
    Backfill,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let run_date = resolve_run_date(args.date.as_deref())?;
    let paths = DataPaths::new(&settings.data_dir);

    let result = match args.command {
        Command::Fetch => stages::fetch(&settings, &paths, run_date).await.map(drop),
        Command::Normalize => stages::normalize(&paths, run_date).await.map(drop),
        Command::Load => {
            let pool = stages::connect(&settings).await?;
            stages::load(&pool, &paths).await.map(drop)
        }
        Command::Analyze => {
            let pool = stages::connect(&settings).await?;
            stages::analyze(&pool, &paths, run_date).await.map(drop)
        }
        Command::Forecast => {
            let pool = stages::connect(&settings).await?;
            stages::forecast(&pool, &paths).await.map(drop)
        }
        Command::Notify => {
            let pool = stages::connect(&settings).await?;
            stages::notify(&pool, &settings, &paths, run_date)
                .await
                .map(drop)
        }
        Command::Run => run_all(&settings, &paths, run_date).await,
        Command::Backfill => {
            let pool = stages::connect(&settings).await?;
            stages::backfill(&pool, &paths).await.map(drop)
        }
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(%run_date, error = %format!("{err:#}"), "stage failed");
    }

    result
}

async fn run_all(settings: &Settings, paths: &DataPaths, run_date: NaiveDate) -> anyhow::Result<()> {
    let pool = stages::connect(settings).await?;

    let acquired = storage::lock::try_acquire_run_date_lock(&pool, run_date).await?;
    if !acquired {
        tracing::warn!(%run_date, "run date lock not acquired; another run in progress");
        return Ok(());
    }

    let result = run_stages(&pool, settings, paths, run_date).await;
    let _ = storage::lock::release_run_date_lock(&pool, run_date).await;
    result
}

async fn run_stages(
    pool: &sqlx::PgPool,
    settings: &Settings,
    paths: &DataPaths,
    run_date: NaiveDate,
) -> anyhow::Result<()> {
    run_stage(pool, "fetch", run_date, stages::fetch(settings, paths, run_date)).await?;
    run_stage(pool, "normalize", run_date, stages::normalize(paths, run_date)).await?;
    run_stage(pool, "load", run_date, stages::load(pool, paths)).await?;
    run_stage(pool, "analyze", run_date, stages::analyze(pool, paths, run_date)).await?;
    run_stage(pool, "forecast", run_date, stages::forecast(pool, paths)).await?;
    run_stage(
        pool,
        "notify",
        run_date,
        stages::notify(pool, settings, paths, run_date),
    )
    .await?;
    Ok(())
}

async fn run_stage<F>(
    pool: &sqlx::PgPool,
    stage: &str,
    run_date: NaiveDate,
    fut: F,
) -> anyhow::Result<i64>
where
    F: std::future::Future<Output = anyhow::Result<i64>>,
{
    let started_at = chrono::Utc::now();
    match fut.await {
        Ok(rows) => {
            storage::runs::record_stage_run(
                pool, stage, run_date, started_at, "success", Some(rows), None,
            )
            .await?;
            tracing::info!(stage, %run_date, rows, "stage finished");
            Ok(rows)
        }
        Err(err) => {
            let _ = storage::runs::record_stage_run(
                pool,
                stage,
                run_date,
                started_at,
                "error",
                None,
                Some(&format!("{err:#}")),
            )
            .await;
            Err(err.context(format!("{stage} stage failed")))
        }
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn resolve_run_date(date_arg: Option<&str>) -> anyhow::Result<NaiveDate> {
    if let Some(s) = date_arg {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --date {s}; expected YYYY-MM-DD"));
    }
    Ok(chrono::Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_run_date() {
        let d = resolve_run_date(Some("2025-05-17")).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 5, 17).unwrap());
    }

    #[test]
    fn rejects_malformed_run_date() {
        assert!(resolve_run_date(Some("17.05.2025")).is_err());
    }
}
