use crate::config::Settings;
use crate::feed::RateFeedClient;
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_URL: &str = "https://bank.gov.ua/NBUStatService/v1/statdirectory/exchange?json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRIES: u32 = 3;

/// Client for the NBU statdirectory daily exchange feed.
#[derive(Debug, Clone)]
pub struct NbuClient {
    http: reqwest::Client,
    url: String,
    retries: u32,
}

impl NbuClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings
            .nbu_api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        Self::new(url)
    }

    pub fn new(url: impl Into<String>) -> Result<Self> {
        let timeout_secs = std::env::var("NBU_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("NBU_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build NBU http client")?;

        Ok(Self {
            http,
            url: url.into(),
            retries,
        })
    }

    async fn fetch_once(&self) -> Result<Value> {
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("NBU request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read NBU response")?;

        if !status.is_success() {
            anyhow::bail!("NBU HTTP {status}: {text}");
        }

        let raw = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("NBU response is not valid JSON: {text}"))?;

        anyhow::ensure!(raw.is_array(), "NBU response is not a JSON array");
        Ok(raw)
    }
}

#[async_trait::async_trait]
impl RateFeedClient for NbuClient {
    fn source_name(&self) -> &'static str {
        "nbu_statdirectory"
    }

    async fn fetch_daily_rates(&self) -> Result<Value> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(raw) => return Ok(raw),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "NBU fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_without_retries(url: &str) -> NbuClient {
        let mut c = NbuClient::new(url).unwrap();
        c.retries = 1;
        c
    }

    #[tokio::test]
    async fn fetches_feed_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"cc": "USD", "rate": 41.2, "txt": "US Dollar", "exchangedate": "15.01.2025"}
            ])))
            .mount(&server)
            .await;

        let client = client_without_retries(&server.uri());
        let raw = client.fetch_daily_rates().await.unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fails_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = client_without_retries(&server.uri());
        let err = client.fetch_daily_rates().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn fails_on_non_array_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"oops": true})))
            .mount(&server)
            .await;

        let client = client_without_retries(&server.uri());
        assert!(client.fetch_daily_rates().await.is_err());
    }
}
