//! Weekly replay of the oversold screen and inverse-RSI allocation.
//!
//! Every Friday of the window the oversold set is bought with a fixed weekly budget
//! at that day's close. Holdings are never sold; the final value marks every
//! holding at its ticker's last close.

use crate::domain::price::PriceSeries;
use crate::domain::stock::{Stock, Ticker};
use crate::indicators::rsi::{calculate_rsi, DEFAULT_RSI_WINDOW};
use crate::ingest::provider::PriceSource;
use crate::ingest::types::PriceRange;
use crate::strategy::allocate::{allocate, Allocation};
use crate::time::calendar::backtest_calendar;
use anyhow::ensure;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Deliberately looser than the live screen's default of 30.
pub const DEFAULT_BACKTEST_OVERSOLD_THRESHOLD: f64 = 95.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub weekly_budget: f64,
    pub rsi_window: usize,
    pub oversold_threshold: f64,
}

impl BacktestParams {
    pub fn new(start: NaiveDate, end: NaiveDate, weekly_budget: f64) -> Self {
        Self {
            start,
            end,
            weekly_budget,
            rsi_window: DEFAULT_RSI_WINDOW,
            oversold_threshold: DEFAULT_BACKTEST_OVERSOLD_THRESHOLD,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.start <= self.end,
            "backtest start {} is after end {}",
            self.start,
            self.end
        );
        ensure!(
            self.weekly_budget.is_finite() && self.weekly_budget >= 0.0,
            "weekly budget must be a non-negative number (got {})",
            self.weekly_budget
        );
        ensure!(self.rsi_window >= 1, "RSI window must be >= 1");
        ensure!(
            (0.0..=100.0).contains(&self.oversold_threshold),
            "oversold threshold must be within 0..=100 (got {})",
            self.oversold_threshold
        );
        Ok(())
    }
}

/// A week in which something was bought.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestWeek {
    pub date: NaiveDate,
    pub allocation: Allocation,
    pub spent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestResult {
    pub amount_invested: f64,
    pub final_value: f64,
    /// Accumulated shares per ticker.
    pub portfolio: BTreeMap<Ticker, f64>,
    pub weeks: Vec<BacktestWeek>,
}

/// Fetches `[start, end]` once per ticker and replays the window.
///
/// Tickers whose fetch fails or returns nothing are left out of the replay.
pub async fn backtest(
    source: &dyn PriceSource,
    tickers: &[Ticker],
    params: &BacktestParams,
) -> anyhow::Result<BacktestResult> {
    params.validate()?;
    let range = PriceRange::between(params.start, params.end)?;

    let mut seen = HashSet::new();
    let mut histories = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        if !seen.insert(ticker) {
            continue;
        }

        match source.fetch_closes(ticker, &range).await {
            Ok(series) if series.is_empty() => {
                tracing::debug!(%ticker, "no history in backtest window; skipping");
            }
            Ok(series) => histories.push((ticker.clone(), series)),
            Err(err) => {
                tracing::warn!(
                    %ticker,
                    error = %format!("{err:#}"),
                    "history fetch failed; ticker left out of backtest"
                );
            }
        }
    }

    tracing::info!(
        requested = tickers.len(),
        with_history = histories.len(),
        start = %params.start,
        end = %params.end,
        "running backtest"
    );

    Ok(simulate(&histories, params))
}

/// Pure replay over already fetched histories.
pub fn simulate(histories: &[(Ticker, PriceSeries)], params: &BacktestParams) -> BacktestResult {
    let prepared: Vec<(&Ticker, &PriceSeries, Vec<Option<f64>>)> = histories
        .iter()
        .map(|(ticker, series)| {
            let rsi = calculate_rsi(&series.closes(), params.rsi_window);
            (ticker, series, rsi)
        })
        .collect();

    let mut result = BacktestResult::default();

    for date in backtest_calendar(params.start, params.end, params.rsi_window) {
        let mut candidates: Vec<Stock> = Vec::new();
        for (ticker, series, rsi) in &prepared {
            // No close that day: the ticker sits this week out.
            let Some(i) = series.position(date) else {
                continue;
            };
            let close = series.points()[i].close;
            if !(close.is_finite() && close > 0.0) {
                continue;
            }
            match rsi[i] {
                Some(r) if r < params.oversold_threshold => {
                    candidates.push(Stock::new((*ticker).clone(), Some(r), close));
                }
                _ => {}
            }
        }

        if candidates.is_empty() {
            continue;
        }

        let allocation = allocate(&candidates, params.weekly_budget);
        if allocation.is_empty() {
            continue;
        }

        let closes: HashMap<&Ticker, f64> =
            candidates.iter().map(|s| (&s.ticker, s.price)).collect();
        for entry in allocation.entries() {
            if let Some(close) = closes.get(&entry.ticker) {
                *result.portfolio.entry(entry.ticker.clone()).or_insert(0.0) +=
                    entry.amount / close;
            }
        }

        let spent = allocation.total();
        result.amount_invested += spent;
        tracing::debug!(%date, buys = allocation.len(), spent, "backtest week");
        result.weeks.push(BacktestWeek {
            date,
            allocation,
            spent,
        });
    }

    let last_closes: HashMap<&Ticker, f64> = prepared
        .iter()
        .filter_map(|(ticker, series, _)| series.last().map(|p| (*ticker, p.close)))
        .collect();

    result.final_value = result
        .portfolio
        .iter()
        .map(|(ticker, shares)| shares * last_closes.get(ticker).copied().unwrap_or(0.0))
        .sum();

    result
}
