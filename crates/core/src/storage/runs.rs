use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Audit trail: one row per executed pipeline stage, success or failure.
pub async fn record_stage_run(
    pool: &sqlx::PgPool,
    stage: &str,
    run_date: NaiveDate,
    started_at: DateTime<Utc>,
    status: &str,
    rows_affected: Option<i64>,
    error: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let finished_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO etl_stage_runs (id, stage, run_date, started_at, finished_at, status, rows_affected, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .persistent(false)
    .bind(id)
    .bind(stage)
    .bind(run_date)
    .bind(started_at)
    .bind(finished_at)
    .bind(status)
    .bind(rows_affected)
    .bind(error)
    .execute(pool)
    .await
    .context("insert etl_stage_runs failed")?;

    Ok(id)
}
