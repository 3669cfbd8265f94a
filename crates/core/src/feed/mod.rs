pub mod nbu;

use anyhow::Result;
use serde_json::Value;

#[async_trait::async_trait]
pub trait RateFeedClient: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetches today's full rate feed as delivered by the upstream, for
    /// verbatim persistence. Parsing/projection happens later.
    async fn fetch_daily_rates(&self) -> Result<Value>;
}
