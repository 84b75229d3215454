use crate::domain::stock::{Stock, Ticker};
use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_OVERSOLD_THRESHOLD: f64 = 30.0;
pub const DEFAULT_OVERBOUGHT_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            oversold: DEFAULT_OVERSOLD_THRESHOLD,
            overbought: DEFAULT_OVERBOUGHT_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn new(oversold: f64, overbought: f64) -> anyhow::Result<Self> {
        let t = Self {
            oversold,
            overbought,
        };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (0.0..=100.0).contains(&self.oversold),
            "oversold threshold must be within 0..=100 (got {})",
            self.oversold
        );
        ensure!(
            (0.0..=100.0).contains(&self.overbought),
            "overbought threshold must be within 0..=100 (got {})",
            self.overbought
        );
        ensure!(
            self.oversold <= self.overbought,
            "oversold threshold {} is above overbought threshold {}",
            self.oversold,
            self.overbought
        );
        Ok(())
    }
}

/// Oversold stocks ascending by RSI, overbought stocks descending by RSI.
/// Ties keep fetch order. Neutral stocks and stocks without an RSI are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub oversold: Vec<Stock>,
    pub overbought: Vec<Stock>,
}

pub fn classify(stocks: &[Stock], thresholds: Thresholds) -> Classification {
    let mut oversold: Vec<(f64, Stock)> = Vec::new();
    let mut overbought: Vec<(f64, Stock)> = Vec::new();

    for stock in latest_by_ticker(stocks) {
        let Some(rsi) = stock.rsi else {
            continue;
        };

        if rsi < thresholds.oversold {
            oversold.push((rsi, stock));
        } else if rsi > thresholds.overbought {
            overbought.push((rsi, stock));
        }
    }

    oversold.sort_by(|a, b| a.0.total_cmp(&b.0));
    overbought.sort_by(|a, b| b.0.total_cmp(&a.0));

    Classification {
        oversold: oversold.into_iter().map(|(_, s)| s).collect(),
        overbought: overbought.into_iter().map(|(_, s)| s).collect(),
    }
}

/// One snapshot per ticker. A later snapshot replaces an earlier one but keeps the
/// earlier one's position.
pub fn latest_by_ticker(stocks: &[Stock]) -> Vec<Stock> {
    let mut index: HashMap<&Ticker, usize> = HashMap::with_capacity(stocks.len());
    let mut out: Vec<Stock> = Vec::with_capacity(stocks.len());

    for stock in stocks {
        match index.get(&stock.ticker) {
            Some(&i) => out[i] = stock.clone(),
            None => {
                index.insert(&stock.ticker, out.len());
                out.push(stock.clone());
            }
        }
    }

    out
}
