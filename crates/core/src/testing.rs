use crate::domain::price::{PricePoint, PriceSeries};
use crate::domain::stock::Ticker;
use crate::ingest::provider::PriceSource;
use crate::ingest::types::PriceRange;
use crate::notify::{DeliveryReceipt, Notification, Notifier};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::Mutex;

pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    series_from_dated(
        &closes
            .iter()
            .enumerate()
            .map(|(i, c)| (start + Duration::days(i as i64), *c))
            .collect::<Vec<_>>(),
    )
}

pub fn series_from_dated(points: &[(NaiveDate, f64)]) -> PriceSeries {
    PriceSeries::new(
        points
            .iter()
            .map(|(date, close)| PricePoint {
                date: *date,
                close: *close,
            })
            .collect(),
    )
}

/// In-memory price source that records every fetch.
#[derive(Default)]
pub struct StaticSource {
    series: HashMap<String, Result<PriceSeries, String>>,
    calls: Mutex<Vec<(String, PriceRange)>>,
}

impl StaticSource {
    pub fn with_closes(self, ticker: &str, closes: &[f64]) -> Self {
        self.with_series(ticker, series_from_closes(closes))
    }

    pub fn with_series(mut self, ticker: &str, series: PriceSeries) -> Self {
        self.series.insert(ticker.to_string(), Ok(series));
        self
    }

    pub fn with_failure(mut self, ticker: &str) -> Self {
        self.series
            .insert(ticker.to_string(), Err(format!("no such symbol {ticker}")));
        self
    }

    pub fn calls_for(&self, ticker: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == ticker)
            .count()
    }

    pub fn ranges(&self) -> Vec<PriceRange> {
        self.calls.lock().unwrap().iter().map(|(_, r)| *r).collect()
    }
}

#[async_trait::async_trait]
impl PriceSource for StaticSource {
    fn source_name(&self) -> &'static str {
        "static"
    }

    async fn fetch_closes(
        &self,
        ticker: &Ticker,
        range: &PriceRange,
    ) -> anyhow::Result<PriceSeries> {
        self.calls
            .lock()
            .unwrap()
            .push((ticker.to_string(), *range));

        match self.series.get(ticker.as_str()) {
            Some(Ok(series)) => Ok(series.clone()),
            Some(Err(msg)) => Err(anyhow::anyhow!(msg.clone())),
            None => Ok(PriceSeries::empty()),
        }
    }
}

/// Captures published notifications; optionally fails every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, notification: &Notification) -> anyhow::Result<DeliveryReceipt> {
        if self.fail {
            anyhow::bail!("delivery refused");
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(DeliveryReceipt {
            channel: self.channel(),
            status: Some(200),
            message_id: Some("msg-1".to_string()),
        })
    }
}
