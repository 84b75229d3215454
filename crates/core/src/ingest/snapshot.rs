use crate::domain::price::PriceSeries;
use crate::domain::stock::{Stock, Ticker};
use crate::indicators::rsi::{latest_rsi, DEFAULT_RSI_WINDOW};
use crate::ingest::error::SourceDiagnosticsError;
use crate::ingest::provider::PriceSource;
use crate::ingest::types::PriceRange;
use std::collections::HashSet;

/// Snapshot of the most recent close and RSI, or `None` for an empty series.
pub fn build_snapshot(ticker: Ticker, series: &PriceSeries, rsi_window: usize) -> Option<Stock> {
    let last = series.last()?;
    let rsi = latest_rsi(&series.closes(), rsi_window);
    Some(Stock::new(ticker, rsi, last.close))
}

/// Fetches and snapshots tickers for a single run.
///
/// A ticker whose fetch failed is remembered and never fetched again by the same
/// builder.
pub struct SnapshotBuilder<'a> {
    source: &'a dyn PriceSource,
    rsi_window: usize,
    range: PriceRange,
    failed: HashSet<Ticker>,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(source: &'a dyn PriceSource, rsi_window: usize, range: PriceRange) -> Self {
        Self {
            source,
            rsi_window,
            range,
            failed: HashSet::new(),
        }
    }

    pub fn with_defaults(source: &'a dyn PriceSource) -> Self {
        Self::new(source, DEFAULT_RSI_WINDOW, PriceRange::default())
    }

    pub fn failed(&self) -> &HashSet<Ticker> {
        &self.failed
    }

    pub async fn build(&mut self, ticker: &Ticker) -> Option<Stock> {
        if self.failed.contains(ticker) {
            tracing::debug!(%ticker, "ticker already failed this run; not fetching again");
            return None;
        }

        match self.source.fetch_closes(ticker, &self.range).await {
            Ok(series) if series.is_empty() => {
                tracing::debug!(%ticker, "no price data this cycle; skipping");
                None
            }
            Ok(series) => build_snapshot(ticker.clone(), &series, self.rsi_window),
            Err(err) => {
                let stage = err
                    .downcast_ref::<SourceDiagnosticsError>()
                    .map(|d| d.stage)
                    .unwrap_or("unknown");
                tracing::warn!(
                    %ticker,
                    source = self.source.source_name(),
                    stage,
                    error = %format!("{err:#}"),
                    "price fetch failed; skipping ticker"
                );
                self.failed.insert(ticker.clone());
                None
            }
        }
    }

    /// Snapshots in fetch order; tickers without data are left out.
    pub async fn build_all(&mut self, tickers: &[Ticker]) -> Vec<Stock> {
        let mut out = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            if let Some(stock) = self.build(ticker).await {
                out.push(stock);
            }
        }
        out
    }
}
