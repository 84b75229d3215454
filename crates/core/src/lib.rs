pub mod backtest;
pub mod domain;
pub mod indicators;
pub mod ingest;
pub mod notify;
pub mod report;
pub mod run;
pub mod strategy;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub sentry_dsn: Option<String>,
        pub price_source_base_url: Option<String>,
        pub price_source_timeout_secs: Option<u64>,
        pub notify_webhook_url: Option<String>,
        pub notify_webhook_token: Option<String>,
        pub notify_webhook_timeout_secs: Option<u64>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                price_source_base_url: std::env::var("PRICE_SOURCE_BASE_URL").ok(),
                price_source_timeout_secs: secs_from_env("PRICE_SOURCE_TIMEOUT_SECS")?,
                notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok(),
                notify_webhook_token: std::env::var("NOTIFY_WEBHOOK_TOKEN").ok(),
                notify_webhook_timeout_secs: secs_from_env("NOTIFY_WEBHOOK_TIMEOUT_SECS")?,
            })
        }

        pub fn require_notify_webhook_url(&self) -> anyhow::Result<&str> {
            self.notify_webhook_url
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .context("NOTIFY_WEBHOOK_URL is required")
        }
    }

    fn secs_from_env(name: &str) -> anyhow::Result<Option<u64>> {
        std::env::var(name)
            .ok()
            .map(|raw| parse_secs(name, &raw))
            .transpose()
    }

    fn parse_secs(name: &str, raw: &str) -> anyhow::Result<u64> {
        raw.trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {name}: {raw:?}"))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn timeout_seconds_parse_or_name_the_variable() {
            assert_eq!(parse_secs("NOTIFY_WEBHOOK_TIMEOUT_SECS", " 12 ").unwrap(), 12);

            let err = parse_secs("NOTIFY_WEBHOOK_TIMEOUT_SECS", "soon").unwrap_err();
            assert!(err.to_string().contains("NOTIFY_WEBHOOK_TIMEOUT_SECS"));
        }
    }
}
