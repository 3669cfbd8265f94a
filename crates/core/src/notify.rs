use crate::config::Settings;
use crate::storage::subscribers::Subscriber;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Minimal Telegram Bot API client: photo and text delivery only.
/// Subscription management lives in the bot, not here.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let token = settings.require_telegram_bot_token()?.to_string();
        let base_url = std::env::var("TELEGRAM_API_BASE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::new(base_url, token)
    }

    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build telegram http client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.base_url.trim_end_matches('/'),
            self.token
        )
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let res = self
            .http
            .post(self.method_url("sendMessage"))
            .form(&[("chat_id", chat_id.to_string()), ("text", text.to_string())])
            .send()
            .await
            .context("sendMessage request failed")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("sendMessage HTTP {status}: {body}");
        }
        Ok(())
    }

    pub async fn send_photo(&self, chat_id: i64, photo: &Path) -> Result<()> {
        let bytes = tokio::fs::read(photo)
            .await
            .with_context(|| format!("failed to read {}", photo.display()))?;
        let file_name = photo
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("chart.png")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part(
                "photo",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("image/png")
                    .context("invalid photo mime type")?,
            );

        let res = self
            .http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .context("sendPhoto request failed")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("sendPhoto HTTP {status}: {body}");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryStats {
    pub sent: usize,
    pub failed: usize,
    pub skipped_artifacts: usize,
}

/// Fans the chart artifacts and the narrative report out to every subscriber.
///
/// Best-effort: a missing artifact is skipped, a failed delivery is logged
/// and counted, and neither stops the rest of the batch. An empty subscriber
/// list is a successful no-op.
pub async fn distribute(
    client: &TelegramClient,
    subscribers: &[Subscriber],
    charts: &[PathBuf],
    narrative: Option<&Path>,
) -> Result<DeliveryStats> {
    let mut stats = DeliveryStats::default();

    if subscribers.is_empty() {
        tracing::info!("no subscribers registered; nothing to deliver");
        return Ok(stats);
    }

    for chart in charts {
        if !chart.is_file() {
            stats.skipped_artifacts += 1;
            tracing::warn!(path = %chart.display(), "chart artifact missing; skipping");
            continue;
        }
        for sub in subscribers {
            match client.send_photo(sub.chat_id, chart).await {
                Ok(()) => stats.sent += 1,
                Err(err) => {
                    stats.failed += 1;
                    tracing::warn!(chat_id = sub.chat_id, error = %err, "photo delivery failed");
                }
            }
        }
    }

    match narrative {
        Some(path) if path.is_file() => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            for sub in subscribers {
                match client.send_message(sub.chat_id, &text).await {
                    Ok(()) => stats.sent += 1,
                    Err(err) => {
                        stats.failed += 1;
                        tracing::warn!(chat_id = sub.chat_id, error = %err, "report delivery failed");
                    }
                }
            }
        }
        Some(path) => {
            stats.skipped_artifacts += 1;
            tracing::warn!(path = %path.display(), "narrative report missing; skipping");
        }
        None => {}
    }

    tracing::info!(
        sent = stats.sent,
        failed = stats.failed,
        skipped = stats.skipped_artifacts,
        "delivery fan-out finished"
    );
    Ok(stats)
}
