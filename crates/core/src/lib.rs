pub mod analytics;
pub mod artifacts;
pub mod chart;
pub mod domain;
pub mod feed;
pub mod forecast;
pub mod normalize;
pub mod notify;
pub mod report;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    const DEFAULT_DATA_DIR: &str = "./data";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub telegram_bot_token: Option<String>,
        pub nbu_api_url: Option<String>,
        pub data_dir: PathBuf,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let data_dir = std::env::var("DATA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
                nbu_api_url: std::env::var("NBU_API_URL").ok(),
                data_dir: PathBuf::from(data_dir),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_telegram_bot_token(&self) -> anyhow::Result<&str> {
            self.telegram_bot_token
                .as_deref()
                .context("TELEGRAM_BOT_TOKEN is required")
        }
    }
}
