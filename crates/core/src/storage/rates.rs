use crate::domain::rate::RateRecord;
use anyhow::Context;
use chrono::NaiveDate;

/// A row read back from `exchange_rates`. Decoded at the store boundary so a
/// missing or mistyped column fails here, not somewhere inside analytics.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RateRow {
    pub cc: String,
    pub txt: String,
    pub rate: f64,
    pub rate_per_100: f64,
    pub exchangedate: NaiveDate,
}

/// Merges a batch of records into `exchange_rates` in one transaction:
/// insert on first sighting of `(cc, exchangedate)`, overwrite rate,
/// rate_per_100 and txt on repeats. All-or-nothing per call, so reruns and
/// overlapping runs stay safe.
pub async fn upsert_rates_atomic(
    pool: &sqlx::PgPool,
    records: &[RateRecord],
) -> anyhow::Result<u64> {
    anyhow::ensure!(!records.is_empty(), "records must be non-empty");

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let mut affected: u64 = 0;
    let chunk_size: usize = std::env::var("RATES_UPSERT_BATCH")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(200);

    anyhow::ensure!(chunk_size >= 1, "RATES_UPSERT_BATCH must be >= 1");

    let mut batch_idx: usize = 0;
    for chunk in records.chunks(chunk_size) {
        batch_idx += 1;
        let t0 = std::time::Instant::now();
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO exchange_rates (cc, txt, rate, rate_per_100, exchangedate) ",
        );
        qb.push_values(chunk, |mut b, record| {
            b.push_bind(record.cc.trim())
                .push_bind(record.txt.trim())
                .push_bind(record.rate)
                .push_bind(record.rate_per_100)
                .push_bind(record.exchange_date);
        });
        qb.push(
            " ON CONFLICT (cc, exchangedate) DO UPDATE \
               SET rate = EXCLUDED.rate, rate_per_100 = EXCLUDED.rate_per_100, txt = EXCLUDED.txt",
        );

        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch upsert exchange_rates failed")?;
        affected += res.rows_affected();

        tracing::debug!(
            batch_idx,
            batch_size = chunk.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "exchange_rates batch upsert"
        );
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(affected)
}

/// Full history for one currency, ordered by exchange date ascending.
pub async fn fetch_history(pool: &sqlx::PgPool, cc: &str) -> anyhow::Result<Vec<RateRow>> {
    sqlx::query_as::<_, RateRow>(
        "SELECT cc, txt, rate, rate_per_100, exchangedate \
         FROM exchange_rates WHERE cc = $1 ORDER BY exchangedate ASC",
    )
    .persistent(false)
    .bind(cc)
    .fetch_all(pool)
    .await
    .with_context(|| format!("fetch exchange_rates history for {cc} failed"))
}

pub async fn count_distinct_currencies(pool: &sqlx::PgPool) -> anyhow::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(DISTINCT cc) FROM exchange_rates")
        .persistent(false)
        .fetch_one(pool)
        .await
        .context("count distinct currencies failed")
}
