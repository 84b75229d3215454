use crate::domain::price::{PricePoint, PriceSeries};
use anyhow::{bail, ensure};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relative history window understood by the price source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookback {
    #[serde(rename = "5d")]
    FiveDays,
    #[default]
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Lookback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lookback::FiveDays => "5d",
            Lookback::OneMonth => "1mo",
            Lookback::ThreeMonths => "3mo",
            Lookback::SixMonths => "6mo",
            Lookback::OneYear => "1y",
            Lookback::TwoYears => "2y",
            Lookback::FiveYears => "5y",
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lookback {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "5d" => Lookback::FiveDays,
            "1mo" => Lookback::OneMonth,
            "3mo" => Lookback::ThreeMonths,
            "6mo" => Lookback::SixMonths,
            "1y" => Lookback::OneYear,
            "2y" => Lookback::TwoYears,
            "5y" => Lookback::FiveYears,
            other => bail!("unknown lookback {other:?} (expected 5d, 1mo, 3mo, 6mo, 1y, 2y or 5y)"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceRange {
    Lookback(Lookback),
    /// Inclusive on both ends.
    Between { start: NaiveDate, end: NaiveDate },
}

impl PriceRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        ensure!(start <= end, "range start {start} is after end {end}");
        Ok(PriceRange::Between { start, end })
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        PriceRange::Lookback(Lookback::default())
    }
}

// Yahoo Finance v8 chart wire format. Only the fields we read are modelled.

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: Option<ChartMeta>,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: ChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartMeta {
    #[serde(default)]
    pub symbol: Option<String>,
    /// Exchange offset from UTC in seconds; bar timestamps are shifted by it before
    /// taking the calendar date.
    #[serde(default)]
    pub gmtoffset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartIndicators {
    #[serde(default)]
    pub quote: Vec<ChartQuote>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartQuote {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

impl ChartResult {
    /// Bars with a missing or non-finite close are dropped.
    pub fn into_series(self) -> PriceSeries {
        let offset = self.meta.as_ref().and_then(|m| m.gmtoffset).unwrap_or(0);
        let Some(quote) = self.indicators.quote.into_iter().next() else {
            return PriceSeries::empty();
        };

        let points = self
            .timestamp
            .iter()
            .zip(quote.close)
            .filter_map(|(&ts, close)| {
                let close = close.filter(|c| c.is_finite())?;
                let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
                Some(PricePoint { date, close })
            })
            .collect();

        PriceSeries::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookback_round_trips_through_str() {
        assert_eq!("3mo".parse::<Lookback>().unwrap(), Lookback::ThreeMonths);
        assert_eq!(Lookback::default().as_str(), "1mo");
        assert!("1 month".parse::<Lookback>().is_err());
    }

    #[test]
    fn between_rejects_inverted_range() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(PriceRange::between(a, b).is_err());
        assert!(PriceRange::between(b, a).is_ok());
    }

    #[test]
    fn chart_result_skips_null_closes_and_applies_offset() {
        // Three sessions, 2024-03-04 through 2024-03-06 at 14:30 UTC, exchange at UTC-5.
        let v = json!({
            "meta": {"symbol": "AAPL", "gmtoffset": -18000},
            "timestamp": [1709562600, 1709649000, 1709735400],
            "indicators": {"quote": [{"close": [175.1, null, 170.0]}]}
        });

        let result: ChartResult = serde_json::from_value(v).unwrap();
        let series = result.into_series();

        assert_eq!(series.len(), 2);
        assert_eq!(
            series.points()[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        assert_eq!(series.last().map(|p| p.close), Some(170.0));
    }

    #[test]
    fn chart_result_without_quotes_is_empty() {
        let v = json!({"meta": {"symbol": "XYZ"}, "indicators": {"quote": []}});
        let result: ChartResult = serde_json::from_value(v).unwrap();
        assert!(result.into_series().is_empty());
    }
}
