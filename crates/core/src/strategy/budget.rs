use crate::domain::stock::Stock;
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BUDGET_AMOUNT: f64 = 400.0;

/// How much money a run distributes across its oversold stocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetPolicy {
    /// The same amount every run.
    Fixed { amount: f64 },
    /// `base * (100 - average RSI) / 50`: a market-wide average RSI of 0 doubles the
    /// base, 50 keeps it, 100 spends nothing.
    RsiScaled { base: f64 },
    /// A fixed increment for every oversold stock.
    PerStock { amount_per_stock: f64 },
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        BudgetPolicy::RsiScaled {
            base: DEFAULT_BUDGET_AMOUNT,
        }
    }
}

/// Run-wide inputs a policy may look at.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketConditions {
    pub average_rsi: Option<f64>,
    pub oversold_count: usize,
}

impl MarketConditions {
    pub fn observe(tracked: &[Stock], oversold: &[Stock]) -> Self {
        Self {
            average_rsi: average_rsi(tracked),
            oversold_count: oversold.len(),
        }
    }
}

impl BudgetPolicy {
    pub fn from_parts(kind: &str, amount: f64) -> anyhow::Result<Self> {
        let policy = match kind.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fixed" => BudgetPolicy::Fixed { amount },
            "rsi_scaled" => BudgetPolicy::RsiScaled { base: amount },
            "per_stock" => BudgetPolicy::PerStock {
                amount_per_stock: amount,
            },
            other => bail!("unknown budget policy {other:?} (expected fixed, rsi_scaled or per_stock)"),
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BudgetPolicy::Fixed { .. } => "fixed",
            BudgetPolicy::RsiScaled { .. } => "rsi_scaled",
            BudgetPolicy::PerStock { .. } => "per_stock",
        }
    }

    pub fn amount(&self) -> f64 {
        match *self {
            BudgetPolicy::Fixed { amount } => amount,
            BudgetPolicy::RsiScaled { base } => base,
            BudgetPolicy::PerStock { amount_per_stock } => amount_per_stock,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let amount = self.amount();
        ensure!(
            amount.is_finite() && amount >= 0.0,
            "{} budget amount must be a non-negative number (got {amount})",
            self.kind()
        );
        Ok(())
    }

    /// The unscaled budget the report measures allocations against. For
    /// `PerStock` there is no scaling, so this equals the total.
    pub fn nominal_budget(&self, market: &MarketConditions) -> f64 {
        match *self {
            BudgetPolicy::Fixed { amount } => amount,
            BudgetPolicy::RsiScaled { base } => base,
            BudgetPolicy::PerStock { .. } => self.total_budget(market),
        }
    }

    pub fn total_budget(&self, market: &MarketConditions) -> f64 {
        match *self {
            BudgetPolicy::Fixed { amount } => amount,
            BudgetPolicy::RsiScaled { base } => market
                .average_rsi
                .map(|avg| base * budget_multiplier(avg))
                .unwrap_or(0.0),
            BudgetPolicy::PerStock { amount_per_stock } => {
                amount_per_stock * market.oversold_count as f64
            }
        }
    }
}

pub fn budget_multiplier(average_rsi: f64) -> f64 {
    (100.0 - average_rsi) / 50.0
}

/// Mean over stocks with a defined RSI; `None` when there are none.
pub fn average_rsi(stocks: &[Stock]) -> Option<f64> {
    let defined: Vec<f64> = stocks.iter().filter_map(|s| s.rsi).collect();
    if defined.is_empty() {
        return None;
    }
    Some(defined.iter().sum::<f64>() / defined.len() as f64)
}
