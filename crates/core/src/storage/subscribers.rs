use anyhow::Context;

/// A notification recipient. Subscription management lives in the Telegram
/// bot; the pipeline only reads the registry.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Subscriber {
    pub chat_id: i64,
}

pub async fn list_subscribers(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Subscriber>> {
    sqlx::query_as::<_, Subscriber>("SELECT chat_id FROM telegram_subscribers ORDER BY chat_id")
        .persistent(false)
        .fetch_all(pool)
        .await
        .context("list telegram_subscribers failed")
}
