use crate::config::Settings;
use crate::domain::price::PriceSeries;
use crate::domain::stock::Ticker;
use crate::ingest::error::SourceDiagnosticsError;
use crate::ingest::types::{ChartResponse, PriceRange};
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) rsiwatch/0.1";
const PROVIDER_NAME: &str = "yahoo_chart";

/// Daily closing prices for one ticker. An empty series means "no data for this
/// range" and is not an error.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_closes(&self, ticker: &Ticker, range: &PriceRange) -> Result<PriceSeries>;
}

#[derive(Debug, Clone)]
pub struct YahooChartSource {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .price_source_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = settings
            .price_source_timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build price source http client")?;

        Ok(Self { http, base_url })
    }

    fn url(&self, ticker: &Ticker) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), ticker)
    }

    fn diagnostics(ticker: &Ticker, stage: &'static str, detail: String) -> anyhow::Error {
        SourceDiagnosticsError {
            provider: PROVIDER_NAME,
            stage,
            ticker: ticker.clone(),
            detail,
        }
        .into()
    }
}

#[async_trait::async_trait]
impl PriceSource for YahooChartSource {
    fn source_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch_closes(&self, ticker: &Ticker, range: &PriceRange) -> Result<PriceSeries> {
        let res = self
            .http
            .get(self.url(ticker))
            .query(&chart_query(range))
            .send()
            .await
            .map_err(|e| Self::diagnostics(ticker, "request", e.to_string()))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| Self::diagnostics(ticker, "body", e.to_string()))?;

        if !status.is_success() {
            // Yahoo reports unknown or delisted symbols with a JSON error body.
            let detail = match serde_json::from_str::<ChartResponse>(&text)
                .ok()
                .and_then(|r| r.chart.error)
            {
                Some(err) => format!(
                    "HTTP {status}: {} {}",
                    err.code,
                    err.description.unwrap_or_default()
                ),
                None => format!("HTTP {status}: {text}"),
            };
            return Err(Self::diagnostics(ticker, "http", detail));
        }

        let series = parse_chart_response(&text)
            .map_err(|e| Self::diagnostics(ticker, "decode", format!("{e:#}")))?;

        tracing::debug!(%ticker, points = series.len(), "fetched daily closes");
        Ok(series)
    }
}

/// Decodes a chart payload; an API-level error object is an error, a missing
/// result is an empty series.
pub fn parse_chart_response(text: &str) -> Result<PriceSeries> {
    let parsed = serde_json::from_str::<ChartResponse>(text)
        .context("price source response is not a valid chart payload")?;

    if let Some(err) = parsed.chart.error {
        anyhow::bail!(
            "chart error {}: {}",
            err.code,
            err.description.unwrap_or_default()
        );
    }

    Ok(parsed
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.into_series())
        .unwrap_or_default())
}

fn chart_query(range: &PriceRange) -> Vec<(&'static str, String)> {
    let mut params = vec![("interval", "1d".to_string())];
    match range {
        PriceRange::Lookback(lookback) => params.push(("range", lookback.as_str().to_string())),
        PriceRange::Between { start, end } => {
            params.push(("period1", epoch_secs(*start).to_string()));
            // period2 is exclusive upstream; extend by a day to keep `end` inclusive.
            params.push(("period2", epoch_secs(*end + ChronoDuration::days(1)).to_string()));
        }
    }
    params
}

fn epoch_secs(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}
