use crate::domain::stock::{Stock, Ticker};
use crate::indicators::rsi::DEFAULT_RSI_WINDOW;
use crate::ingest::provider::PriceSource;
use crate::ingest::snapshot::SnapshotBuilder;
use crate::ingest::types::{Lookback, PriceRange};
use crate::notify::{DeliveryReceipt, Notification, Notifier};
use crate::report::{render_report, ReportInput, DEFAULT_SUBJECT};
use crate::strategy::allocate::{allocate, Allocation};
use crate::strategy::budget::{BudgetPolicy, MarketConditions, DEFAULT_BUDGET_AMOUNT};
use crate::strategy::classify::{classify, latest_by_ticker, Classification, Thresholds};
use anyhow::{ensure, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "TSLA", "NVDA", "AMZN", "META", "JPM", "V", "PG", "MA", "HD", "COST", "KO",
    "PEP", "WMT", "CSCO", "CAT", "GE", "NKE", "LOW", "UBER", "BLK", "SBUX", "CVX", "BX", "PYPL",
    "TGT", "WM", "CMG", "MMM", "LULU", "COF", "KHC", "DAL", "ABNB", "JNJ", "COIN", "SQ", "U",
    "DKNG", "AMD", "SHOP",
];

/// Parameters of one report run, fixed at start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOptions {
    pub tickers: Vec<Ticker>,
    pub rsi_window: usize,
    pub thresholds: Thresholds,
    pub lookback: Lookback,
    pub budget_policy: BudgetPolicy,
    pub subject: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS
                .iter()
                .filter_map(|s| Ticker::new(s).ok())
                .collect(),
            rsi_window: DEFAULT_RSI_WINDOW,
            thresholds: Thresholds::default(),
            lookback: Lookback::default(),
            budget_policy: BudgetPolicy::default(),
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }
}

impl RunOptions {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `get`. Unset or blank variables
    /// keep their defaults; malformed ones are errors.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let mut out = Self::default();

        if let Some(s) = get("RSI_TICKERS") {
            out.tickers = Ticker::parse_list(&s).context("invalid RSI_TICKERS")?;
        }
        if let Some(n) = parse_var::<usize>(get("RSI_WINDOW"), "RSI_WINDOW")? {
            out.rsi_window = n;
        }
        if let Some(v) = parse_var::<f64>(get("RSI_OVERSOLD_THRESHOLD"), "RSI_OVERSOLD_THRESHOLD")? {
            out.thresholds.oversold = v;
        }
        if let Some(v) =
            parse_var::<f64>(get("RSI_OVERBOUGHT_THRESHOLD"), "RSI_OVERBOUGHT_THRESHOLD")?
        {
            out.thresholds.overbought = v;
        }
        if let Some(lookback) = parse_var::<Lookback>(get("PRICE_LOOKBACK"), "PRICE_LOOKBACK")? {
            out.lookback = lookback;
        }

        let kind = get("BUDGET_POLICY");
        let amount = parse_var::<f64>(get("BUDGET_AMOUNT"), "BUDGET_AMOUNT")?;
        if kind.is_some() || amount.is_some() {
            out.budget_policy = BudgetPolicy::from_parts(
                kind.as_deref().unwrap_or(out.budget_policy.kind()),
                amount.unwrap_or(DEFAULT_BUDGET_AMOUNT),
            )
            .context("invalid BUDGET_POLICY/BUDGET_AMOUNT")?;
        }

        if let Some(subject) = get("REPORT_SUBJECT") {
            out.subject = subject;
        }

        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.tickers.is_empty(), "ticker list must be non-empty");
        ensure!(self.rsi_window >= 1, "RSI window must be >= 1");
        self.thresholds.validate()?;
        self.budget_policy.validate()?;
        Ok(())
    }
}

fn parse_var<T>(value: Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .map(|s| {
            s.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid {key}={s:?}: {e}"))
        })
        .transpose()
}

/// Scheduler-supplied context of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationContext {
    pub invocation_id: Uuid,
    pub triggered_at: DateTime<Utc>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            triggered_at: Utc::now(),
        }
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a run computed before delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub classification: Classification,
    pub allocation: Allocation,
    pub average_rsi: Option<f64>,
    pub total_budget: f64,
    pub notification: Notification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub invocation_id: Uuid,
    pub tracked: usize,
    pub with_data: usize,
    pub failed: usize,
    pub oversold: Vec<Ticker>,
    pub overbought: Vec<Ticker>,
    pub average_rsi: Option<f64>,
    pub budget_policy: BudgetPolicy,
    pub total_budget: f64,
    pub total_allocated: f64,
    pub receipt: DeliveryReceipt,
}

/// Classifies, budgets, allocates and renders already built snapshots.
pub fn evaluate(stocks: &[Stock], opts: &RunOptions) -> WeeklyReport {
    let tracked = latest_by_ticker(stocks);
    let classification = classify(&tracked, opts.thresholds);
    let market = MarketConditions::observe(&tracked, &classification.oversold);
    let total_budget = opts.budget_policy.total_budget(&market);
    let allocation = allocate(&classification.oversold, total_budget);

    let notification = render_report(
        &opts.subject,
        &ReportInput {
            classification: &classification,
            allocation: &allocation,
            average_rsi: market.average_rsi,
            nominal_budget: opts.budget_policy.nominal_budget(&market),
        },
    );

    WeeklyReport {
        classification,
        allocation,
        average_rsi: market.average_rsi,
        total_budget,
        notification,
    }
}

pub async fn run_weekly_report(
    source: &dyn PriceSource,
    notifier: &dyn Notifier,
    opts: &RunOptions,
    ctx: &InvocationContext,
) -> anyhow::Result<RunSummary> {
    let range = PriceRange::Lookback(opts.lookback);
    let mut builder = SnapshotBuilder::new(source, opts.rsi_window, range);
    let stocks = builder.build_all(&opts.tickers).await;
    let failed = builder.failed().len();

    let report = evaluate(&stocks, opts);

    tracing::info!(
        invocation_id = %ctx.invocation_id,
        tracked = opts.tickers.len(),
        with_data = stocks.len(),
        failed,
        average_rsi = ?report.average_rsi,
        oversold = report.classification.oversold.len(),
        overbought = report.classification.overbought.len(),
        policy = opts.budget_policy.kind(),
        total_budget = report.total_budget,
        "weekly report computed"
    );

    let receipt = notifier
        .publish(&report.notification)
        .await
        .with_context(|| format!("report delivery via {} failed", notifier.channel()))?;

    tracing::info!(
        invocation_id = %ctx.invocation_id,
        channel = receipt.channel,
        message_id = ?receipt.message_id,
        "report delivered"
    );

    Ok(RunSummary {
        invocation_id: ctx.invocation_id,
        tracked: opts.tickers.len(),
        with_data: stocks.len(),
        failed,
        oversold: tickers_of(&report.classification.oversold),
        overbought: tickers_of(&report.classification.overbought),
        average_rsi: report.average_rsi,
        budget_policy: opts.budget_policy,
        total_budget: report.total_budget,
        total_allocated: report.allocation.total(),
        receipt,
    })
}

/// Entry point for schedulers. The event payload is opaque and only logged.
pub async fn handle_invocation(
    event: &Value,
    ctx: &InvocationContext,
    source: &dyn PriceSource,
    notifier: &dyn Notifier,
    opts: &RunOptions,
) -> anyhow::Result<RunSummary> {
    let event_source = event.get("source").and_then(Value::as_str).unwrap_or("unknown");
    tracing::info!(
        invocation_id = %ctx.invocation_id,
        triggered_at = %ctx.triggered_at,
        event_source,
        "invocation received"
    );

    opts.validate()?;
    run_weekly_report(source, notifier, opts, ctx).await
}

fn tickers_of(stocks: &[Stock]) -> Vec<Ticker> {
    stocks.iter().map(|s| s.ticker.clone()).collect()
}
